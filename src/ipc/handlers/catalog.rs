use crate::ipc::types::{AppState, Request};
use crate::mapper::{AcademicYear, Course, Group, SubCategory, Subject};

use super::crud;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    crud::try_handle::<AcademicYear>(state, req)
        .or_else(|| crud::try_handle::<Group>(state, req))
        .or_else(|| crud::try_handle::<Course>(state, req))
        .or_else(|| crud::try_handle::<SubCategory>(state, req))
        .or_else(|| crud::try_handle::<Subject>(state, req))
}
