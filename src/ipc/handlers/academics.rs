use crate::ipc::types::{AppState, Request};
use crate::mapper::{Exam, ExamResult, HallTicket};

use super::crud;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    crud::try_handle::<Exam>(state, req)
        .or_else(|| crud::try_handle::<ExamResult>(state, req))
        .or_else(|| crud::try_handle::<HallTicket>(state, req))
}
