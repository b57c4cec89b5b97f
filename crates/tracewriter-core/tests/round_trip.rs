//! Round-trip and import properties of the codec and export synthesizer.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use tracewriter_core::annotations::AnnotationStore;
use tracewriter_core::codec::{
    decode_annotated_export, decode_document, decode_preprocessed, detect_shape, ImportDocument,
    Shape, ANNOTATION_FIELD, LEGACY_PROPERTY_ID,
};
use tracewriter_core::export::{synthesize, ExportOptions};
use tracewriter_core::models::{Email, Hierarchy, Property, Thread};
use tracewriter_core::session::Session;

fn options() -> ExportOptions {
    ExportOptions {
        annotator: "team".to_string(),
        annotated_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
    }
}

fn export(h: &Hierarchy, a: &AnnotationStore) -> Value {
    serde_json::to_value(synthesize(h, a, &options())).unwrap()
}

fn preprocessed() -> Value {
    json!([
        {
            "id": "prop_7250_franklin",
            "subject": "7250 Franklin Ave",
            "property": "7250 franklin ave",
            "thread_count": 2,
            "email_count": 5,
            "threads": [
                {
                    "id": "prop_7250_franklin_thread_0",
                    "subject": "Offer accepted",
                    "normalized_subject": "offer accepted",
                    "email_count": 3,
                    "emails": [
                        {"id": "m1", "from": "agent@example.com", "to": "buyer@example.com",
                         "date": "2024-12-12T14:34:00Z", "subject": "Offer accepted", "body": "Great news"},
                        {"id": "m2", "from": "buyer@example.com", "date": "2024-12-13T09:00:00Z",
                         "subject": "Re: Offer accepted", "body": "Thanks"},
                        {"from": "escrow@example.com", "date": "2024-12-15T10:15:00Z",
                         "subject": "Re: Offer accepted", "body": "Escrow opened"}
                    ]
                },
                {
                    "id": "prop_7250_franklin_thread_1",
                    "subject": "Inspection",
                    "normalized_subject": "inspection",
                    "email_count": 2,
                    "emails": [
                        {"id": "m4", "from": "inspector@example.com", "body": "Report attached"},
                        {"id": "m5", "from": "agent@example.com", "dateDisplay": "Dec 20, 01:00 PM", "body": "Got it"}
                    ]
                }
            ]
        },
        {
            "id": "prop_12_elm",
            "subject": "12 Elm St",
            "property": "12 elm st",
            "threads": [
                {
                    "id": "prop_12_elm_thread_0",
                    "subject": "Listing",
                    "normalized_subject": "listing",
                    "emails": [
                        {"id": "e1", "from": "seller@example.com", "body": "Listing live"}
                    ]
                }
            ]
        }
    ])
}

#[test]
fn test_round_trip_restores_hierarchy_and_valid_annotations() {
    let h = decode_preprocessed(&preprocessed()).unwrap();
    let mut a = AnnotationStore::new();
    a.set("prop_7250_franklin_thread_0", 0, "  called buyer  ");
    a.set("prop_7250_franklin_thread_0", 1, "sent to escrow");
    a.set("prop_7250_franklin_thread_0", 2, "terminal, never exported");
    a.set("prop_7250_franklin_thread_1", 0, "   ");
    a.set("prop_12_elm_thread_0", 0, "single email thread has no gaps");
    a.set("no_such_thread", 0, "stale");

    let (h2, a2) = decode_annotated_export(&export(&h, &a)).unwrap();
    assert_eq!(h2, h);
    assert_eq!(a2, a.restricted_to(&h));
    assert_eq!(a2.len(), 2);
    assert_eq!(a2.get("prop_7250_franklin_thread_0", 0), Some("called buyer"));
}

#[test]
fn test_terminal_gap_invariant() {
    let h = decode_preprocessed(&preprocessed()).unwrap();
    let mut a = AnnotationStore::new();
    for (_, t) in h.threads() {
        for i in 0..t.email_count() + 2 {
            a.set(&t.id, i, format!("note {}", i));
        }
    }

    let doc = export(&h, &a);
    for property in doc.as_array().unwrap() {
        for thread in property["threads"].as_array().unwrap() {
            let emails = thread["emails"].as_array().unwrap();
            assert_eq!(emails.last().unwrap()[ANNOTATION_FIELD], Value::Null);
            for e in &emails[..emails.len() - 1] {
                assert!(e[ANNOTATION_FIELD].is_string());
            }
        }
    }
}

#[test]
fn test_shape_detection() {
    assert_eq!(detect_shape(&preprocessed()), Shape::Preprocessed);

    let mut doc = preprocessed();
    doc[1]["threads"][0]["emails"][0][ANNOTATION_FIELD] = Value::Null;
    assert_eq!(detect_shape(&doc), Shape::AnnotatedExport);

    assert_eq!(detect_shape(&json!("not a document")), Shape::Preprocessed);
    assert_eq!(detect_shape(&json!([1, {"threads": 3}])), Shape::Preprocessed);
}

#[test]
fn test_idempotent_reimport() {
    let mut doc = preprocessed();
    doc[0]["threads"][0]["emails"][0][ANNOTATION_FIELD] = json!("called buyer");
    doc[0]["threads"][0]["emails"][1][ANNOTATION_FIELD] = json!("");
    doc[0]["threads"][1]["emails"][0][ANNOTATION_FIELD] = json!("scheduled inspector");

    let (h1, a1) = decode_annotated_export(&doc).unwrap();
    let (h2, a2) = decode_annotated_export(&export(&h1, &a1)).unwrap();
    assert_eq!(a2, a1);
    assert_eq!(h2, h1);
    assert_eq!(a1.len(), 2);
}

#[test]
fn test_merge_overwrites_only_overlapping_keys() {
    let h = decode_preprocessed(&preprocessed()).unwrap();
    let mut session = Session::from_parts(h.clone(), AnnotationStore::new());
    session.annotate("prop_7250_franklin_thread_0", 0, "session: called buyer");
    session.annotate("prop_7250_franklin_thread_0", 1, "session: emailed escrow");

    let mut incoming = AnnotationStore::new();
    incoming.set("prop_7250_franklin_thread_0", 1, "import: wired deposit");
    incoming.set("prop_7250_franklin_thread_1", 0, "import: booked inspector");

    let bytes = serde_json::to_vec(&export(&h, &incoming)).unwrap();
    session.import_json(&bytes).unwrap();

    let a = session.annotations();
    assert_eq!(a.get("prop_7250_franklin_thread_0", 0), Some("session: called buyer"));
    assert_eq!(a.get("prop_7250_franklin_thread_0", 1), Some("import: wired deposit"));
    assert_eq!(a.get("prop_7250_franklin_thread_1", 0), Some("import: booked inspector"));
}

#[test]
fn test_legacy_flat_lift() {
    let doc = json!([
        {"id": "t1", "subject": "Escrow", "emails": [
            {"id": "a", "from": "x", "body": "1", "_annotation_after": "called"},
            {"id": "b", "from": "y", "body": "2", "_annotation_after": null},
            {"id": "c", "from": "z", "body": "3", "_annotation_after": null}
        ]},
        {"id": "t2", "subject": "Loan", "emails": [
            {"id": "d", "from": "x", "body": "4", "_annotation_after": null},
            {"id": "e", "from": "y", "body": "5", "_annotation_after": null}
        ]}
    ]);

    let ImportDocument::AnnotatedExport { hierarchy, annotations } = decode_document(&doc).unwrap() else {
        panic!("expected an annotated export");
    };
    assert_eq!(hierarchy.property_count(), 1);
    let p = &hierarchy.properties[0];
    assert_eq!(p.id, LEGACY_PROPERTY_ID);
    assert_eq!(p.thread_count(), 2);
    assert_eq!(p.email_count(), 5);
    assert_eq!(annotations.get("t1", 0), Some("called"));

    let out = export(&hierarchy, &annotations);
    assert_eq!(out[0]["thread_count"], 2);
    assert_eq!(out[0]["email_count"], 5);
}

#[test]
fn test_called_escrow_scenario() {
    let doc = json!({
        "id": "p", "subject": "s", "property": "p",
        "threads": [{"id": "thread", "subject": "s", "normalized_subject": "s", "emails": [
            {"id": "0", "from": "a", "body": "x"},
            {"id": "1", "from": "a", "body": "x"},
            {"id": "2", "from": "a", "body": "x"},
            {"id": "3", "from": "a", "body": "x"}
        ]}]
    });
    let h = decode_preprocessed(&doc).unwrap();
    let t = &h.properties[0].threads[0];
    assert!((0..3).all(|i| t.has_gap(i)));
    assert!(!t.has_gap(3));

    let mut a = AnnotationStore::new();
    a.set("thread", 2, "called escrow");
    let out = export(&h, &a);
    let emails = &out[0]["threads"][0]["emails"];
    assert_eq!(emails[2][ANNOTATION_FIELD], "called escrow");
    assert_eq!(emails[3][ANNOTATION_FIELD], Value::Null);
}

#[test]
fn test_missing_email_id_and_display_date_are_filled() {
    let h = decode_preprocessed(&preprocessed()).unwrap();
    let t0 = &h.properties[0].threads[0];
    assert_eq!(t0.emails[2].id, "msg_2");
    assert_eq!(t0.emails[0].display_timestamp, "Dec 12, 02:34 PM");
    let t1 = &h.properties[0].threads[1];
    assert_eq!(t1.emails[0].display_timestamp, "Unknown date");
    assert_eq!(t1.emails[1].display_timestamp, "Dec 20, 01:00 PM");
}

#[test]
fn test_decode_error_names_path() {
    let mut doc = preprocessed();
    doc[0]["threads"][1]["emails"][1]
        .as_object_mut()
        .unwrap()
        .remove("from");
    let err = decode_preprocessed(&doc).unwrap_err();
    assert_eq!(err.path(), Some("$[0].threads[1].emails[1]"));
    assert!(err.to_string().contains("from"));
}

// ============ Generated hierarchies ============

/// Hierarchy whose shape varies with `seed`: 0 to 2 properties, 0 to 2
/// threads each, 0 to 3 emails per thread. Optional fields alternate
/// between set and unset.
fn generated_hierarchy(seed: usize) -> Hierarchy {
    let properties = (0..seed % 3)
        .map(|p| Property {
            id: format!("p{}_{}", seed, p),
            subject: format!("Property {}", p),
            property: format!("{} franklin ave", p),
            threads: (0..(seed + p) % 3)
                .map(|t| {
                    let thread_id = format!("p{}_{}_thread_{}", seed, p, t);
                    Thread {
                        subject: format!("Thread {}", t),
                        normalized_subject: format!("thread {}", t),
                        emails: (0..(seed + p + t) % 4)
                            .map(|e| {
                                let dated = (seed + e) % 2 == 0;
                                Email {
                                    id: format!("{}_m{}", thread_id, e),
                                    sender: format!("sender{}@example.com", e),
                                    recipient: dated.then(|| "escrow@example.com".to_string()),
                                    timestamp: dated.then(|| format!("2024-03-0{}T09:15:00Z", e + 1)),
                                    display_timestamp: if dated {
                                        format!("Mar 0{}, 09:15 AM", e + 1)
                                    } else {
                                        "Unknown date".to_string()
                                    },
                                    subject: (!dated).then(|| format!("Re: Thread {}", t)),
                                    body: format!("body {}", e),
                                }
                            })
                            .collect(),
                        id: thread_id,
                    }
                })
                .collect(),
        })
        .collect();
    Hierarchy::new(properties)
}

/// Annotations at every index of every thread, including the terminal
/// email and one past it, with a mix of plain, padded and blank text, plus
/// a key for a thread that does not exist.
fn generated_annotations(h: &Hierarchy, seed: usize) -> AnnotationStore {
    let mut store = AnnotationStore::new();
    for (_, thread) in h.threads() {
        for i in 0..thread.email_count() + 2 {
            let text = match (seed + i) % 3 {
                0 => format!("note {} on {}", i, thread.id),
                1 => format!("  padded note {}  ", i),
                _ => "   ".to_string(),
            };
            store.set(&thread.id, i, text);
        }
    }
    store.set("no_such_thread", 0, "stale");
    store
}

#[test]
fn test_round_trip_over_generated_hierarchies() {
    for seed in 0..24 {
        let h = generated_hierarchy(seed);
        let a = generated_annotations(&h, seed);

        let doc = export(&h, &a);
        let (decoded_h, decoded_a) = decode_annotated_export(&doc).unwrap();

        assert_eq!(decoded_h, h, "hierarchy differs for seed {}", seed);
        assert_eq!(decoded_a, a.restricted_to(&h), "annotations differ for seed {}", seed);

        for thread in doc.as_array().unwrap().iter().flat_map(|p| p["threads"].as_array().unwrap()) {
            if let Some(last) = thread["emails"].as_array().unwrap().last() {
                assert_eq!(last[ANNOTATION_FIELD], Value::Null);
            }
        }
    }
}

#[test]
fn test_generated_hierarchies_cover_edge_shapes() {
    let shapes: Vec<Hierarchy> = (0..24).map(generated_hierarchy).collect();
    assert!(shapes.iter().any(Hierarchy::is_empty));
    assert!(shapes
        .iter()
        .any(|h| h.properties.iter().any(|p| p.threads.is_empty())));
    for emails in 0..=1 {
        assert!(shapes
            .iter()
            .any(|h| h.threads().any(|(_, t)| t.email_count() == emails)));
    }
}
