mod test_support;

use serde_json::json;
use test_support::Sidecar;

fn names(result: &serde_json::Value) -> Vec<String> {
    result["feeCategories"]
        .as_array()
        .expect("feeCategories")
        .iter()
        .filter_map(|v| v["name"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn fee_categories_set_replaces_the_whole_list() {
    let mut s = Sidecar::admin("collegeadmin-fee-categories");

    let first = s.ok(
        "feeCategories.set",
        json!({ "items": [
            { "name": "Tuition", "fees": [{ "name": "Term 1", "amount": 12000 }] },
            { "name": " Library " },
            { "name": "Exam" }
        ]}),
    );
    assert_eq!(names(&first), vec!["Exam", "Library", "Tuition"]);
    let tuition_id = first["feeCategories"]
        .as_array()
        .and_then(|a| a.iter().find(|c| c["name"] == json!("Tuition")))
        .and_then(|c| c["id"].as_str())
        .expect("tuition id")
        .to_string();

    let second = s.ok(
        "feeCategories.set",
        json!({ "items": [
            { "id": tuition_id, "name": "Tuition", "fees": [] },
            { "name": "Transport" }
        ]}),
    );
    assert_eq!(names(&second), vec!["Transport", "Tuition"]);

    let listed = s.ok("feeCategories.list", json!({}));
    assert_eq!(names(&listed), vec!["Transport", "Tuition"]);
    let kept = listed["feeCategories"]
        .as_array()
        .and_then(|a| a.iter().find(|c| c["name"] == json!("Tuition")))
        .expect("tuition kept");
    assert_eq!(kept["id"], json!(tuition_id));
}

#[test]
fn fee_categories_set_rejects_case_collisions_and_keeps_previous_list() {
    let mut s = Sidecar::admin("collegeadmin-fee-collisions");

    s.ok("feeCategories.set", json!({ "items": [{ "name": "Tuition" }] }));
    assert_eq!(
        s.fails(
            "feeCategories.set",
            json!({ "items": [{ "name": "Library" }, { "name": "library " }] })
        ),
        "duplicate"
    );
    assert_eq!(s.fails("feeCategories.set", json!({})), "bad_params");

    let listed = s.ok("feeCategories.list", json!({}));
    assert_eq!(names(&listed), vec!["Tuition"]);
}

#[test]
fn semester_fees_replace_only_their_own_semester() {
    let mut s = Sidecar::admin("collegeadmin-semester-fees");

    let base = |semester: i64, entries: serde_json::Value| {
        json!({
            "academicYear": "2024-2027",
            "groupName": "MPC",
            "courseName": "B.Sc MPC",
            "semester": semester,
            "entries": entries
        })
    };

    s.ok(
        "fees.setSemester",
        base(1, json!([{ "feeCategory": "Tuition", "amount": 10000 }, { "feeCategory": "Lab", "amount": 1500 }])),
    );
    s.ok("fees.setSemester", base(2, json!([{ "feeCategory": "Tuition", "amount": 11000 }])));

    let replaced = s.ok(
        "fees.setSemester",
        base(1, json!([{ "feeCategory": "Tuition", "amount": 10500 }])),
    );
    assert_eq!(replaced["feeDefinitions"].as_array().map(|a| a.len()), Some(1));

    let listed = s.ok("feeDefinitions.list", json!({}));
    let rows = listed["feeDefinitions"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .any(|r| r["semester"] == json!(1) && r["amount"] == json!(10500.0)));
    assert!(rows
        .iter()
        .any(|r| r["semester"] == json!(2) && r["amount"] == json!(11000.0)));

    assert_eq!(
        s.fails(
            "fees.setSemester",
            base(2, json!([{ "feeCategory": "Lab" }, { "feeCategory": "LAB" }]))
        ),
        "duplicate"
    );
    assert_eq!(
        s.fails("fees.setSemester", base(2, json!([{ "feeCategory": "Lab", "amount": "lots" }]))),
        "bad_params"
    );
}

#[test]
fn semester_fees_need_a_group_and_stay_within_it() {
    let mut s = Sidecar::admin("collegeadmin-semester-groups");

    let sheet = |group: &str, amount: i64| {
        json!({
            "academicYear": "2024-2027",
            "groupName": group,
            "courseName": "B.Sc",
            "semester": 1,
            "entries": [{ "feeCategory": "Tuition", "amount": amount }]
        })
    };
    s.ok("fees.setSemester", sheet("MPC", 10000));
    s.ok("fees.setSemester", sheet("BiPC", 9000));
    s.ok("fees.setSemester", sheet("MPC", 10500));

    let listed = s.ok("feeDefinitions.list", json!({}));
    let rows = listed["feeDefinitions"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .any(|r| r["groupName"] == json!("BiPC") && r["amount"] == json!(9000.0)));

    assert_eq!(
        s.fails(
            "fees.setSemester",
            json!({
                "academicYear": "2024-2027",
                "courseName": "B.Sc",
                "semester": 1,
                "entries": [{ "feeCategory": "Tuition", "amount": 1 }]
            })
        ),
        "bad_params"
    );
    assert_eq!(
        s.ok("feeDefinitions.list", json!({}))["feeDefinitions"]
            .as_array()
            .map(|a| a.len()),
        Some(2)
    );
}

#[test]
fn kept_fee_categories_can_trade_names() {
    let mut s = Sidecar::admin("collegeadmin-fee-swap");

    let first = s.ok(
        "feeCategories.set",
        json!({ "items": [{ "name": "Tuition" }, { "name": "Exam" }] }),
    );
    let id_of = |name: &str| {
        first["feeCategories"]
            .as_array()
            .and_then(|a| a.iter().find(|c| c["name"] == json!(name)))
            .and_then(|c| c["id"].as_str())
            .expect("id")
            .to_string()
    };
    let (tuition, exam) = (id_of("Tuition"), id_of("Exam"));

    s.ok(
        "feeCategories.set",
        json!({ "items": [
            { "id": tuition, "name": "Exam" },
            { "id": exam, "name": "Tuition" }
        ]}),
    );
    let listed = s.ok("feeCategories.list", json!({}));
    let swapped = listed["feeCategories"]
        .as_array()
        .and_then(|a| a.iter().find(|c| c["id"] == json!(tuition)))
        .expect("kept");
    assert_eq!(swapped["name"], json!("Exam"));
}
