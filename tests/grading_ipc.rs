
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request, request_err, request_ok, spawn_sidecar, str_field, temp_dir};

struct Fixture {
    class_id: String,
    ada: String,
    edsger: String,
}

fn setup_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> Fixture {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = str_field(
        &request_ok(stdin, reader, "class", "classes.create", json!({ "name": "Period 3" })),
        "classId",
    );
    let _ = request_ok(
        stdin,
        reader,
        "import",
        "roster.applyImport",
        json!({
            "classId": class_id,
            "text": "Student ID,First Name,Last Name\nS1,Ada,Lovelace\nS2,Edsger,Dijkstra\n"
        }),
    );
    let listed = request_ok(stdin, reader, "list", "roster.list", json!({ "classId": class_id }));
    let students = listed["students"].as_array().expect("students");
    let id_of = |last: &str| {
        students
            .iter()
            .find(|s| s["lastName"] == last)
            .map(|s| str_field(s, "id"))
            .expect("student")
    };
    Fixture {
        ada: id_of("Lovelace"),
        edsger: id_of("Dijkstra"),
        class_id,
    }
}

fn key(points: &[(&str, f64)]) -> serde_json::Value {
    json!(points
        .iter()
        .enumerate()
        .map(|(i, (c, p))| json!({ "question": i + 1, "correct": c, "points": p }))
        .collect::<Vec<_>>())
}

fn precondition_reason(resp: &serde_json::Value) -> String {
    assert_eq!(resp["ok"], false, "expected failure: {}", resp);
    assert_eq!(resp["error"]["code"], "precondition_failed");
    str_field(&resp["error"]["details"], "reason")
}

#[test]
fn answer_key_lifecycle_and_scoring() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_class(&mut stdin, &mut reader, "classroomd-grading-mc");

    let assignment_id = str_field(
        &request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "assignments.create",
            json!({
                "classId": fx.class_id,
                "title": "Unit 1 Quiz",
                "kind": "multiple_choice",
                "totalPoints": 30
            }),
        ),
        "assignmentId",
    );

    let defaults = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "answerKey.defaults",
        json!({ "questions": 4, "assignmentId": assignment_id }),
    );
    let entries = defaults["key"].as_array().expect("key");
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3], json!({ "question": 4, "correct": "A", "points": 7.0 }));
    assert_eq!(defaults["balanced"], false);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "answerKey.save",
        json!({ "assignmentId": assignment_id, "key": key(&[("A", 10.0), ("B", 10.0), ("C", 5.0)]) }),
    );
    assert_eq!(code, "points_mismatch");

    let bad_numbering = request(
        &mut stdin,
        &mut reader,
        "4",
        "answerKey.save",
        json!({
            "assignmentId": assignment_id,
            "key": [
                { "question": 1, "correct": "A", "points": 15.0 },
                { "question": 3, "correct": "B", "points": 15.0 }
            ]
        }),
    );
    assert_eq!(precondition_reason(&bad_numbering), "bad_numbering");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "answerKey.save",
        json!({ "assignmentId": assignment_id, "key": key(&[("A", 10.0), ("B", 10.0), ("C", 10.0)]) }),
    );
    let stored = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "answerKey.get",
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(stored["key"].as_array().map(Vec::len), Some(3));
    assert_eq!(stored["pointsCheck"], json!({ "expected": 30.0, "actual": 30.0 }));

    let scored = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grading.scoreMultipleChoice",
        json!({ "assignmentId": assignment_id, "answers": ["a", "B", "D"] }),
    );
    assert_eq!(scored["score"].as_f64(), Some(20.0));
    assert_eq!(scored["percentage"].as_f64(), Some(66.7));
    assert_eq!(scored["percentLabel"], "66.7%");
    assert_eq!(scored["letter"], "D");
    assert_eq!(scored["correct"], json!([true, true, false]));
    assert_eq!(scored["correctCount"], 2);
    assert_eq!(scored["warnings"], json!([]));

    let unanswered = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grading.scoreMultipleChoice",
        json!({ "assignmentId": assignment_id, "answers": [null, "", " "] }),
    );
    assert_eq!(unanswered["score"].as_f64(), Some(0.0));
    assert_eq!(unanswered["letter"], "F");

    let short = request(
        &mut stdin,
        &mut reader,
        "9",
        "grading.scoreMultipleChoice",
        json!({ "assignmentId": assignment_id, "answers": ["A"] }),
    );
    assert_eq!(precondition_reason(&short), "sheet_length_mismatch");

    let bad_choice = request(
        &mut stdin,
        &mut reader,
        "10",
        "grading.scoreMultipleChoice",
        json!({ "assignmentId": assignment_id, "answers": ["A", "F", "C"] }),
    );
    assert_eq!(precondition_reason(&bad_choice), "unknown_choice");

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "grading.saveSubmissions",
        json!({
            "assignmentId": assignment_id,
            "submissions": [
                { "studentId": fx.ada, "answers": ["A", "B", "C"] },
                { "studentId": fx.edsger, "answers": ["A", null, null] }
            ]
        }),
    );
    assert_eq!(saved["saved"], 2);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "grading.saveSubmissions",
        json!({
            "assignmentId": assignment_id,
            "submissions": [{ "studentId": "not-a-student", "answers": ["A", "B", "C"] }]
        }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn inline_scoring_flags_points_mismatch_without_blocking() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let scored = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grading.scoreMultipleChoice",
        json!({
            "key": key(&[("A", 10.0), ("B", 10.0), ("C", 5.0)]),
            "totalPoints": 30,
            "answers": ["A", "B", "C"]
        }),
    );
    assert_eq!(scored["score"].as_f64(), Some(25.0));
    assert_eq!(scored["percentage"].as_f64(), Some(83.3));
    assert_eq!(scored["warnings"][0]["code"], "points_mismatch");

    let zero_total = request(
        &mut stdin,
        &mut reader,
        "2",
        "grading.scoreMultipleChoice",
        json!({ "key": key(&[("A", 1.0)]), "totalPoints": 0, "answers": ["A"] }),
    );
    assert_eq!(precondition_reason(&zero_total), "non_positive_total");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "grading.scoreMultipleChoice",
        json!({ "answers": ["A"] }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn rubric_save_list_and_score() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup_class(&mut stdin, &mut reader, "classroomd-grading-rubric");

    let templates = request_ok(&mut stdin, &mut reader, "1", "rubrics.templates", json!({}));
    let templates = templates["templates"].as_array().expect("templates").clone();
    assert_eq!(templates.len(), 3);
    assert_eq!(templates[0]["name"], "5-Paragraph Essay Rubric");
    assert_eq!(templates[0]["type"], "essay");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "rubrics.save",
        json!({ "rubric": templates[0] }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "3", "rubrics.list", json!({}));
    assert_eq!(listed["rubrics"].as_array().map(Vec::len), Some(1));

    let lopsided = json!({
        "name": "Lopsided",
        "type": "short_answer",
        "criteria": [{ "name": "a", "weight": 40 }, { "name": "b", "weight": 40 }]
    });
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "rubrics.save",
        json!({ "rubric": lopsided }),
    );
    assert_eq!(code, "weights_mismatch");

    let zero_weight = request(
        &mut stdin,
        &mut reader,
        "5",
        "rubrics.save",
        json!({ "rubric": {
            "name": "Zero",
            "type": "essay",
            "criteria": [{ "name": "a", "weight": 0 }, { "name": "b", "weight": 100 }]
        }}),
    );
    assert_eq!(precondition_reason(&zero_weight), "invalid_weight");

    let criteria = templates[0]["criteria"].as_array().expect("criteria").clone();
    let raws = [18.0, 35.0, 16.0, 9.0, 8.0];
    let scores: Vec<serde_json::Value> = criteria
        .iter()
        .zip(raws)
        .map(|(c, r)| json!({ "criterion": c, "rawScore": r }))
        .collect();
    let scored = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grading.scoreRubric",
        json!({ "scores": scores }),
    );
    assert_eq!(scored["score"].as_f64(), Some(86.0));
    assert_eq!(scored["percentage"].as_f64(), Some(86.0));
    assert_eq!(scored["letter"], "B");
    assert_eq!(scored["warnings"], json!([]));
    let levels: Vec<&str> = scored["criteria"]
        .as_array()
        .expect("criteria")
        .iter()
        .map(|c| c["level"].as_str().expect("level"))
        .collect();
    assert_eq!(levels, vec!["high", "medium", "medium", "high", "medium"]);

    let flagged = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grading.scoreRubric",
        json!({ "scores": [
            { "criterion": { "name": "a", "weight": 40 }, "rawScore": 40 },
            { "criterion": { "name": "b", "weight": 40 }, "rawScore": 40 }
        ]}),
    );
    assert_eq!(flagged["score"].as_f64(), Some(80.0));
    assert_eq!(flagged["warnings"][0]["code"], "weights_mismatch");

    let over = request(
        &mut stdin,
        &mut reader,
        "8",
        "grading.scoreRubric",
        json!({ "scores": [{ "criterion": { "name": "a", "weight": 10 }, "rawScore": 10.5 }] }),
    );
    assert_eq!(precondition_reason(&over), "criterion_out_of_range");

    let essay_id = str_field(
        &request_ok(
            &mut stdin,
            &mut reader,
            "9",
            "assignments.create",
            json!({
                "classId": fx.class_id,
                "title": "Essay 1",
                "kind": "essay",
                "totalPoints": 100
            }),
        ),
        "assignmentId",
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grading.saveSubmissions",
        json!({
            "assignmentId": essay_id,
            "submissions": [{ "studentId": fx.ada, "criterionScores": scores }]
        }),
    );
    assert_eq!(saved["saved"], 1);

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "grades.export",
        json!({ "assignmentId": essay_id }),
    );
    let line = exported["csv"].as_str().expect("csv").lines().nth(1).expect("row").to_string();
    assert!(line.starts_with("S1,Lovelace,Ada,86,86.0%,finalized,"), "{}", line);

    let lopsided_sheet = request(
        &mut stdin,
        &mut reader,
        "12",
        "grading.saveSubmissions",
        json!({
            "assignmentId": essay_id,
            "submissions": [
                { "studentId": fx.ada, "criterionScores": scores },
                { "studentId": fx.ada, "criterionScores": [
                    { "criterion": { "name": "a", "weight": 40 }, "rawScore": 40 },
                    { "criterion": { "name": "b", "weight": 40 }, "rawScore": 40 }
                ]}
            ]
        }),
    );
    assert_eq!(lopsided_sheet["ok"], false);
    assert_eq!(lopsided_sheet["error"]["code"], "weights_mismatch");
    assert_eq!(lopsided_sheet["error"]["details"]["index"], 1);
    assert_eq!(lopsided_sheet["error"]["details"]["actual"].as_f64(), Some(80.0));
}
