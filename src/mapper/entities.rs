use chrono::{Local, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    build_row, cell_flag, cell_int, cell_num, cell_opt_text, cell_text, derive_duration,
    encode_list, flag, opt_int, opt_num, opt_text, parse_list, text, Entity, Params,
};
use crate::error::AdminError;
use crate::store::{Backend, Row, StoreError};

const YEAR_LABEL: &str = r"^(\d{4})-(\d{4})$";

/// UG or PG. Stored upper-case.
fn parse_category(params: &Params<'_>) -> Result<String, AdminError> {
    let raw = params.required_text(&["category", "programType", "program_type"])?;
    let upper = raw.to_ascii_uppercase();
    match upper.as_str() {
        "UG" | "PG" => Ok(upper),
        _ => Err(AdminError::bad_params("category must be UG or PG")),
    }
}

fn year_span(category: &str) -> i64 {
    if category == "PG" {
        2
    } else {
        3
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: Option<String>,
    pub label: String,
    pub active: bool,
    pub category: String,
}

impl AcademicYear {
    pub fn validate_label(label: &str, category: &str) -> Result<(), AdminError> {
        let re = Regex::new(YEAR_LABEL).map_err(|e| AdminError::bad_params(e.to_string()))?;
        let caps = re
            .captures(label)
            .ok_or_else(|| AdminError::bad_params("label must look like YYYY-YYYY"))?;
        let start: i64 = caps[1].parse().map_err(|_| AdminError::bad_params("bad start year"))?;
        let end: i64 = caps[2].parse().map_err(|_| AdminError::bad_params("bad end year"))?;
        let span = year_span(category);
        if end - start != span {
            return Err(AdminError::bad_params(format!(
                "{} academic years span {} years (got {})",
                category, span, label
            )));
        }
        Ok(())
    }
}

impl Entity for AcademicYear {
    const TABLE: &'static str = "academic_years";
    const PREFIX: &'static str = "years";
    const KEY: &'static str = "year";
    const LABEL: &'static str = "academic year";
    const ORDER_BY: &'static [&'static str] = &["label"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            label: cell_text(row, "label"),
            active: cell_flag(row, "active"),
            category: cell_text(row, "category"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("label", text(&self.label)),
                ("active", flag(self.active)),
                ("category", text(&self.category)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let category = parse_category(p)?;
        let label = p.required_text(&["label", "year", "academicYear", "name"])?;
        Self::validate_label(&label, &category)?;
        Ok(Self {
            id: p.opt_text(&["id"]),
            label,
            active: p.flag(&["active", "isActive", "is_active"], true)?,
            category,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    pub category: String,
    pub duration: Option<i64>,
    pub semesters: Option<i64>,
}

impl Entity for Group {
    const TABLE: &'static str = "groups";
    const PREFIX: &'static str = "groups";
    const KEY: &'static str = "group";
    const LABEL: &'static str = "group";
    const ORDER_BY: &'static [&'static str] = &["code"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            code: cell_text(row, "code"),
            name: cell_text(row, "name"),
            category: cell_text(row, "category"),
            duration: cell_int(row, "duration"),
            semesters: cell_int(row, "semesters"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("code", text(&self.code)),
                ("name", text(&self.name)),
                ("category", text(&self.category)),
                ("duration", opt_int(self.duration)),
                ("semesters", opt_int(self.semesters)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            code: p.required_text(&["code", "groupCode", "group_code"])?,
            name: p.required_text(&["name", "groupName", "group_name"])?,
            category: parse_category(p)?,
            duration: p.int(&["duration", "years"])?,
            semesters: p.int(&["semesters", "semesterCount", "semester_count", "noOfSemesters"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    /// Group is referenced by name, not id.
    pub group_name: String,
    pub semesters: Option<i64>,
    pub duration: Option<i64>,
}

impl Entity for Course {
    const TABLE: &'static str = "courses";
    const PREFIX: &'static str = "courses";
    const KEY: &'static str = "course";
    const LABEL: &'static str = "course";
    const ORDER_BY: &'static [&'static str] = &["code"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            code: cell_text(row, "code"),
            name: cell_text(row, "name"),
            group_name: cell_text(row, "group_name"),
            semesters: cell_int(row, "semesters"),
            duration: cell_int(row, "duration"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("code", text(&self.code)),
                ("name", text(&self.name)),
                ("group_name", text(&self.group_name)),
                ("semesters", opt_int(self.semesters)),
                ("duration", opt_int(self.duration)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let semesters = p.int(&["semesters", "semesterCount", "semester_count", "noOfSemesters"])?;
        let duration = match p.int(&["duration", "years"])? {
            Some(d) => Some(d),
            None => derive_duration(semesters),
        };
        Ok(Self {
            id: p.opt_text(&["id"]),
            code: p.required_text(&["code", "courseCode", "course_code"])?,
            name: p.required_text(&["name", "courseName", "course_name"])?,
            group_name: p.required_text(&["groupName", "group", "group_name"])?,
            semesters,
            duration,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    pub id: Option<String>,
    pub name: String,
    pub subjects: Vec<String>,
}

impl Entity for SubCategory {
    const TABLE: &'static str = "sub_categories";
    const PREFIX: &'static str = "subCategories";
    const KEY: &'static str = "subCategory";
    const LABEL: &'static str = "sub-category";
    const ORDER_BY: &'static [&'static str] = &["name"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            name: cell_text(row, "name"),
            subjects: row.get("subjects").map(parse_list).unwrap_or_default(),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("name", text(&self.name)),
                ("subjects", encode_list(&self.subjects)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            name: p.required_text(&["name", "categoryName", "category_name"])?,
            subjects: p.list(&["subjects", "subjectNames", "subject_names"]),
        })
    }

    fn cascade(store: &dyn Backend, id: &str) -> Result<(), StoreError> {
        let id = Value::String(id.to_string());
        store.delete_where(Subject::TABLE, &[("category_id", &id)])?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Option<String>,
    pub academic_year: String,
    pub course_name: String,
    pub semester: Option<i64>,
    pub category_id: Option<String>,
    pub subject_code: Option<String>,
    pub subject_name: String,
    pub fee_amount: Option<f64>,
}

impl Entity for Subject {
    const TABLE: &'static str = "subjects";
    const PREFIX: &'static str = "subjects";
    const KEY: &'static str = "subject";
    const LABEL: &'static str = "subject";
    const ORDER_BY: &'static [&'static str] = &["academic_year", "course_name", "semester"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            academic_year: cell_text(row, "academic_year"),
            course_name: cell_text(row, "course_name"),
            semester: cell_int(row, "semester"),
            category_id: cell_opt_text(row, "category_id"),
            subject_code: cell_opt_text(row, "subject_code"),
            subject_name: cell_text(row, "subject_name"),
            fee_amount: cell_num(row, "fee_amount"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("academic_year", text(&self.academic_year)),
                ("course_name", text(&self.course_name)),
                ("semester", opt_int(self.semester)),
                ("category_id", opt_text(&self.category_id)),
                ("subject_code", opt_text(&self.subject_code)),
                ("subject_name", text(&self.subject_name)),
                ("fee_amount", opt_num(self.fee_amount)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            academic_year: p.required_text(&["academicYear", "year", "academic_year"])?,
            course_name: p.required_text(&["courseName", "course", "course_name"])?,
            semester: p.int(&["semester", "sem"])?,
            category_id: p.opt_text(&["categoryId", "category_id", "subCategoryId", "category"]),
            subject_code: p.opt_text(&["subjectCode", "code", "subject_code"]),
            subject_name: p.required_text(&["subjectName", "name", "subject_name"])?,
            fee_amount: p.number(&["feeAmount", "fee", "fee_amount", "amount"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub group_name: Option<String>,
    pub course_name: Option<String>,
    pub academic_year: Option<String>,
    pub status: String,
    pub submitted_at: Option<String>,
}

impl Entity for Application {
    const TABLE: &'static str = "applications";
    const PREFIX: &'static str = "applications";
    const KEY: &'static str = "application";
    const LABEL: &'static str = "application";
    const ORDER_BY: &'static [&'static str] = &["submitted_at"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            full_name: cell_text(row, "full_name"),
            email: cell_text(row, "email"),
            phone: cell_opt_text(row, "phone"),
            group_name: cell_opt_text(row, "group_name"),
            course_name: cell_opt_text(row, "course_name"),
            academic_year: cell_opt_text(row, "academic_year"),
            status: cell_text(row, "status"),
            submitted_at: cell_opt_text(row, "submitted_at"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("full_name", text(&self.full_name)),
                ("email", text(&self.email)),
                ("phone", opt_text(&self.phone)),
                ("group_name", opt_text(&self.group_name)),
                ("course_name", opt_text(&self.course_name)),
                ("academic_year", opt_text(&self.academic_year)),
                ("status", text(&self.status)),
                ("submitted_at", opt_text(&self.submitted_at)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let email = p.required_text(&["email", "emailId", "email_id"])?;
        if !email.contains('@') {
            return Err(AdminError::bad_params("email must be a valid address"));
        }
        Ok(Self {
            id: p.opt_text(&["id"]),
            full_name: p.required_text(&["fullName", "name", "full_name", "applicantName"])?,
            email,
            phone: p.opt_text(&["phone", "mobile", "phoneNumber"]),
            group_name: p.opt_text(&["groupName", "group", "group_name"]),
            course_name: p.opt_text(&["courseName", "course", "course_name"]),
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            status: p
                .opt_text(&["status"])
                .unwrap_or_else(|| "pending".to_string()),
            submitted_at: p.opt_text(&["submittedAt", "submitted_at", "createdAt"]),
        })
    }

    fn before_insert(&mut self) {
        if self.submitted_at.is_none() {
            self.submitted_at = Some(Utc::now().to_rfc3339());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Option<String>,
    pub student_id: String,
    pub hall_ticket_no: Option<String>,
    pub aadhar_number: Option<String>,
    pub email: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub group_name: Option<String>,
    pub course_name: Option<String>,
    pub academic_year: Option<String>,
    pub batch_name: Option<String>,
    pub semester: Option<i64>,
}

impl Entity for Student {
    const TABLE: &'static str = "students";
    const PREFIX: &'static str = "students";
    const KEY: &'static str = "student";
    const LABEL: &'static str = "student";
    const ORDER_BY: &'static [&'static str] = &["student_id"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            student_id: cell_text(row, "student_id"),
            hall_ticket_no: cell_opt_text(row, "hall_ticket_no"),
            aadhar_number: cell_opt_text(row, "aadhar_number"),
            email: cell_opt_text(row, "email"),
            full_name: cell_text(row, "full_name"),
            phone: cell_opt_text(row, "phone"),
            group_name: cell_opt_text(row, "group_name"),
            course_name: cell_opt_text(row, "course_name"),
            academic_year: cell_opt_text(row, "academic_year"),
            batch_name: cell_opt_text(row, "batch_name"),
            semester: cell_int(row, "semester"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("student_id", text(&self.student_id)),
                ("hall_ticket_no", opt_text(&self.hall_ticket_no)),
                ("aadhar_number", opt_text(&self.aadhar_number)),
                ("email", opt_text(&self.email)),
                ("full_name", text(&self.full_name)),
                ("phone", opt_text(&self.phone)),
                ("group_name", opt_text(&self.group_name)),
                ("course_name", opt_text(&self.course_name)),
                ("academic_year", opt_text(&self.academic_year)),
                ("batch_name", opt_text(&self.batch_name)),
                ("semester", opt_int(self.semester)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let aadhar_number = p.opt_text(&["aadharNumber", "aadhar", "aadhar_number", "aadhaar"]);
        if let Some(a) = &aadhar_number {
            if a.len() != 12 || !a.chars().all(|c| c.is_ascii_digit()) {
                return Err(AdminError::bad_params("aadharNumber must be 12 digits"));
            }
        }
        let email = p.opt_text(&["email", "emailId", "email_id"]);
        if email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(AdminError::bad_params("email must be a valid address"));
        }
        Ok(Self {
            id: p.opt_text(&["id"]),
            student_id: p.required_text(&["studentId", "student_id", "rollNo", "admissionNo"])?,
            hall_ticket_no: p.opt_text(&["hallTicketNo", "hall_ticket_no", "hallTicket"]),
            aadhar_number,
            email,
            full_name: p.required_text(&["fullName", "name", "full_name", "studentName"])?,
            phone: p.opt_text(&["phone", "mobile", "phoneNumber"]),
            group_name: p.opt_text(&["groupName", "group", "group_name"]),
            course_name: p.opt_text(&["courseName", "course", "course_name"]),
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            batch_name: p.opt_text(&["batchName", "batch", "batch_name"]),
            semester: p.int(&["semester", "sem", "currentSemester"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: Option<String>,
    pub name: String,
    pub academic_year: Option<String>,
    pub course_name: Option<String>,
    pub start_date: Option<String>,
}

impl Entity for Batch {
    const TABLE: &'static str = "batches";
    const PREFIX: &'static str = "batches";
    const KEY: &'static str = "batch";
    const LABEL: &'static str = "batch";
    const ORDER_BY: &'static [&'static str] = &["name"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            name: cell_text(row, "name"),
            academic_year: cell_opt_text(row, "academic_year"),
            course_name: cell_opt_text(row, "course_name"),
            start_date: cell_opt_text(row, "start_date"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("name", text(&self.name)),
                ("academic_year", opt_text(&self.academic_year)),
                ("course_name", opt_text(&self.course_name)),
                ("start_date", opt_text(&self.start_date)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            name: p.required_text(&["name", "batchName", "batch_name"])?,
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            course_name: p.opt_text(&["courseName", "course", "course_name"]),
            start_date: p.date(&["startDate", "start_date"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Option<String>,
    pub name: String,
    pub academic_year: Option<String>,
    pub course_name: Option<String>,
    pub semester: Option<i64>,
    pub exam_date: Option<String>,
}

impl Entity for Exam {
    const TABLE: &'static str = "exams";
    const PREFIX: &'static str = "exams";
    const KEY: &'static str = "exam";
    const LABEL: &'static str = "exam";
    const ORDER_BY: &'static [&'static str] = &["exam_date", "name"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            name: cell_text(row, "name"),
            academic_year: cell_opt_text(row, "academic_year"),
            course_name: cell_opt_text(row, "course_name"),
            semester: cell_int(row, "semester"),
            exam_date: cell_opt_text(row, "exam_date"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("name", text(&self.name)),
                ("academic_year", opt_text(&self.academic_year)),
                ("course_name", opt_text(&self.course_name)),
                ("semester", opt_int(self.semester)),
                ("exam_date", opt_text(&self.exam_date)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            name: p.required_text(&["name", "examName", "exam_name"])?,
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            course_name: p.opt_text(&["courseName", "course", "course_name"]),
            semester: p.int(&["semester", "sem"])?,
            exam_date: p.date(&["examDate", "date", "exam_date"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDefinition {
    pub id: Option<String>,
    pub academic_year: String,
    pub group_name: Option<String>,
    pub course_name: String,
    pub semester: Option<i64>,
    pub fee_category: String,
    pub amount: Option<f64>,
}

impl Entity for FeeDefinition {
    const TABLE: &'static str = "fee_definitions";
    const PREFIX: &'static str = "feeDefinitions";
    const KEY: &'static str = "feeDefinition";
    const LABEL: &'static str = "fee definition";
    const ORDER_BY: &'static [&'static str] = &["academic_year", "course_name", "semester"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            academic_year: cell_text(row, "academic_year"),
            group_name: cell_opt_text(row, "group_name"),
            course_name: cell_text(row, "course_name"),
            semester: cell_int(row, "semester"),
            fee_category: cell_text(row, "fee_category"),
            amount: cell_num(row, "amount"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("academic_year", text(&self.academic_year)),
                ("group_name", opt_text(&self.group_name)),
                ("course_name", text(&self.course_name)),
                ("semester", opt_int(self.semester)),
                ("fee_category", text(&self.fee_category)),
                ("amount", opt_num(self.amount)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            academic_year: p.required_text(&["academicYear", "year", "academic_year"])?,
            group_name: p.opt_text(&["groupName", "group", "group_name"]),
            course_name: p.required_text(&["courseName", "course", "course_name"])?,
            semester: p.int(&["semester", "sem"])?,
            fee_category: p.required_text(&["feeCategory", "category", "fee_category", "feeType"])?,
            amount: p.number(&["amount", "fee", "feeAmount"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEntry {
    pub name: String,
    pub amount: Option<f64>,
}

impl FeeEntry {
    fn parse_all(v: &Value) -> Vec<FeeEntry> {
        let items = match v {
            Value::Array(items) => items.clone(),
            Value::String(s) => serde_json::from_str::<Vec<Value>>(s).unwrap_or_default(),
            _ => Vec::new(),
        };
        items
            .iter()
            .filter_map(|item| {
                let p = Params::new(item);
                let name = p.opt_text(&["name", "label", "feeName"])?;
                Some(FeeEntry {
                    name,
                    amount: p.number(&["amount", "fee"]).ok().flatten(),
                })
            })
            .collect()
    }

    fn parse_params(p: &Params<'_>, aliases: &[&str]) -> Result<Vec<FeeEntry>, AdminError> {
        let found = aliases
            .iter()
            .filter_map(|a| p.raw().get(*a))
            .find(|v| !v.is_null());
        let field = aliases.first().copied().unwrap_or("fees");
        let bad = || AdminError::bad_params(format!("{} must be a list", field));
        let items = match found {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
            Some(Value::String(s)) => {
                serde_json::from_str::<Vec<Value>>(s).map_err(|_| bad())?
            }
            Some(_) => return Err(bad()),
        };
        items
            .iter()
            .map(|item| {
                let ip = Params::new(item);
                Ok(FeeEntry {
                    name: ip.required_text(&["name", "label", "feeName"])?,
                    amount: ip.number(&["amount", "fee"])?,
                })
            })
            .collect()
    }

    fn encode_all(entries: &[FeeEntry]) -> Value {
        let items: Vec<Value> = entries
            .iter()
            .map(|e| json!({ "name": e.name, "amount": e.amount }))
            .collect();
        Value::String(Value::Array(items).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCategory {
    pub id: Option<String>,
    pub name: String,
    pub fees: Vec<FeeEntry>,
}

impl Entity for FeeCategory {
    const TABLE: &'static str = "fee_categories";
    const PREFIX: &'static str = "feeCategories";
    const KEY: &'static str = "feeCategory";
    const LABEL: &'static str = "fee category";
    const ORDER_BY: &'static [&'static str] = &["name"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            name: cell_text(row, "name"),
            fees: row.get("fees").map(FeeEntry::parse_all).unwrap_or_default(),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("name", text(&self.name)),
                ("fees", FeeEntry::encode_all(&self.fees)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            name: p.required_text(&["name", "feeType", "fee_type", "categoryName"])?,
            fees: FeeEntry::parse_params(p, &["fees", "feeList", "fee_list", "items"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Option<String>,
    pub student_id: String,
    pub academic_year: Option<String>,
    pub semester: Option<i64>,
    pub fee_category: Option<String>,
    pub amount: Option<f64>,
    pub paid_on: Option<String>,
    pub method: Option<String>,
    pub reference: Option<String>,
}

impl Entity for Payment {
    const TABLE: &'static str = "payments";
    const PREFIX: &'static str = "payments";
    const KEY: &'static str = "payment";
    const LABEL: &'static str = "payment";
    const ORDER_BY: &'static [&'static str] = &["paid_on", "student_id"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            student_id: cell_text(row, "student_id"),
            academic_year: cell_opt_text(row, "academic_year"),
            semester: cell_int(row, "semester"),
            fee_category: cell_opt_text(row, "fee_category"),
            amount: cell_num(row, "amount"),
            paid_on: cell_opt_text(row, "paid_on"),
            method: cell_opt_text(row, "method"),
            reference: cell_opt_text(row, "reference"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("student_id", text(&self.student_id)),
                ("academic_year", opt_text(&self.academic_year)),
                ("semester", opt_int(self.semester)),
                ("fee_category", opt_text(&self.fee_category)),
                ("amount", opt_num(self.amount)),
                ("paid_on", opt_text(&self.paid_on)),
                ("method", opt_text(&self.method)),
                ("reference", opt_text(&self.reference)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let amount = p
            .number(&["amount", "paidAmount", "paid_amount"])?
            .ok_or_else(|| AdminError::bad_params("amount must not be empty"))?;
        if amount <= 0.0 {
            return Err(AdminError::bad_params("amount must be positive"));
        }
        Ok(Self {
            id: p.opt_text(&["id"]),
            student_id: p.required_text(&["studentId", "student_id", "rollNo"])?,
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            semester: p.int(&["semester", "sem"])?,
            fee_category: p.opt_text(&["feeCategory", "feeType", "fee_category"]),
            amount: Some(amount),
            paid_on: p.date(&["paidOn", "paid_on", "date", "paymentDate"])?,
            method: p.opt_text(&["method", "paymentMode", "payment_mode"]),
            reference: p.opt_text(&["reference", "transactionId", "receiptNo"]),
        })
    }

    fn before_insert(&mut self) {
        if self.paid_on.is_none() {
            self.paid_on = Some(Local::now().date_naive().format("%Y-%m-%d").to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: Option<String>,
    pub student_id: String,
    pub exam_name: String,
    pub subject_name: String,
    pub academic_year: Option<String>,
    pub semester: Option<i64>,
    pub marks: Option<f64>,
    pub max_marks: Option<f64>,
    pub grade: Option<String>,
}

impl Entity for ExamResult {
    const TABLE: &'static str = "results";
    const PREFIX: &'static str = "results";
    const KEY: &'static str = "result";
    const LABEL: &'static str = "result";
    const ORDER_BY: &'static [&'static str] = &["student_id", "exam_name"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            student_id: cell_text(row, "student_id"),
            exam_name: cell_text(row, "exam_name"),
            subject_name: cell_text(row, "subject_name"),
            academic_year: cell_opt_text(row, "academic_year"),
            semester: cell_int(row, "semester"),
            marks: cell_num(row, "marks"),
            max_marks: cell_num(row, "max_marks"),
            grade: cell_opt_text(row, "grade"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("student_id", text(&self.student_id)),
                ("exam_name", text(&self.exam_name)),
                ("subject_name", text(&self.subject_name)),
                ("academic_year", opt_text(&self.academic_year)),
                ("semester", opt_int(self.semester)),
                ("marks", opt_num(self.marks)),
                ("max_marks", opt_num(self.max_marks)),
                ("grade", opt_text(&self.grade)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        let marks = p.number(&["marks", "score", "marksObtained"])?;
        let max_marks = p.number(&["maxMarks", "max_marks", "outOf"])?;
        if let (Some(m), Some(max)) = (marks, max_marks) {
            if m < 0.0 || m > max {
                return Err(AdminError::bad_params("marks must be between 0 and maxMarks"));
            }
        }
        Ok(Self {
            id: p.opt_text(&["id"]),
            student_id: p.required_text(&["studentId", "student_id", "rollNo"])?,
            exam_name: p.required_text(&["examName", "exam", "exam_name"])?,
            subject_name: p.required_text(&["subjectName", "subject", "subject_name"])?,
            academic_year: p.opt_text(&["academicYear", "year", "academic_year"]),
            semester: p.int(&["semester", "sem"])?,
            marks,
            max_marks,
            grade: p.opt_text(&["grade"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HallTicket {
    pub id: Option<String>,
    pub student_id: String,
    pub exam_name: String,
    pub hall_ticket_no: String,
    pub issued_on: Option<String>,
}

impl Entity for HallTicket {
    const TABLE: &'static str = "hall_tickets";
    const PREFIX: &'static str = "hallTickets";
    const KEY: &'static str = "hallTicket";
    const LABEL: &'static str = "hall ticket";
    const ORDER_BY: &'static [&'static str] = &["student_id"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: cell_opt_text(row, "id"),
            student_id: cell_text(row, "student_id"),
            exam_name: cell_text(row, "exam_name"),
            hall_ticket_no: cell_text(row, "hall_ticket_no"),
            issued_on: cell_opt_text(row, "issued_on"),
        }
    }

    fn to_row(&self) -> Row {
        build_row(
            self.id(),
            [
                ("student_id", text(&self.student_id)),
                ("exam_name", text(&self.exam_name)),
                ("hall_ticket_no", text(&self.hall_ticket_no)),
                ("issued_on", opt_text(&self.issued_on)),
            ],
        )
    }

    fn from_params(p: &Params<'_>) -> Result<Self, AdminError> {
        Ok(Self {
            id: p.opt_text(&["id"]),
            student_id: p.required_text(&["studentId", "student_id", "rollNo"])?,
            exam_name: p.required_text(&["examName", "exam", "exam_name"])?,
            hall_ticket_no: p.required_text(&["hallTicketNo", "hall_ticket_no", "ticketNo"])?,
            issued_on: p.date(&["issuedOn", "issued_on", "date"])?,
        })
    }
}
