//! Response resolution — golden body set.
//!
//! Each case is a raw body as a proxy might send it, and the answer the
//! client must deliver. Bodies are kept verbatim (extra fields included) so
//! the set doubles as a record of the shapes seen in the wild.

use palaver_llm::resolve::resolve_body;

struct GoldenBody {
    name: &'static str,
    raw: &'static str,
    expected: &'static str,
}

fn golden_bodies() -> Vec<GoldenBody> {
    vec![
        // ---------------------------------------------------------------
        // 1. Upstream error
        // ---------------------------------------------------------------
        GoldenBody {
            name: "error_object",
            raw: r#"{"error":{"message":"model not loaded","code":503}}"#,
            expected: "",
        },
        GoldenBody {
            name: "error_string_beats_answer",
            raw: r#"{"error":"rate limited","answer":"ignored"}"#,
            expected: "",
        },
        // ---------------------------------------------------------------
        // 2. Top-level structured answer
        // ---------------------------------------------------------------
        GoldenBody {
            name: "top_level_answer",
            raw: r#"{"answer":"Welcome to Ashford!","usage":{"tokens":12}}"#,
            expected: "Welcome to Ashford!",
        },
        // ---------------------------------------------------------------
        // 3a. choices[0].data.answer
        // ---------------------------------------------------------------
        GoldenBody {
            name: "choice_data_answer",
            raw: r#"{"id":"x","choices":[{"index":0,"data":{"answer":"The crops need rain."}}]}"#,
            expected: "The crops need rain.",
        },
        // ---------------------------------------------------------------
        // 3b. choices[0].message.content
        // ---------------------------------------------------------------
        GoldenBody {
            name: "chat_completion_plain_content",
            raw: r#"{"object":"chat.completion","choices":[{"message":{"role":"assistant","content":"  Good morrow!  "},"finish_reason":"stop"}]}"#,
            expected: "Good morrow!",
        },
        GoldenBody {
            name: "chat_completion_wrapped_answer",
            raw: r#"{"choices":[{"message":{"role":"assistant","content":"{\"answer\":\"Mind the zombies.\"}"}}]}"#,
            expected: "Mind the zombies.",
        },
        GoldenBody {
            name: "chat_completion_broken_wrapper_kept_verbatim",
            raw: r#"{"choices":[{"message":{"content":"{not really json}"}}]}"#,
            expected: "{not really json}",
        },
        // ---------------------------------------------------------------
        // 3c. choices[0].text
        // ---------------------------------------------------------------
        GoldenBody {
            name: "legacy_completion_text",
            raw: r#"{"choices":[{"text":"Hail, stranger.","logprobs":null}]}"#,
            expected: "Hail, stranger.",
        },
        // ---------------------------------------------------------------
        // 4. Legacy top-level response
        // ---------------------------------------------------------------
        GoldenBody {
            name: "legacy_response",
            raw: r#"{"model":"default","response":"The well is dry.","done":true}"#,
            expected: "The well is dry.",
        },
        // ---------------------------------------------------------------
        // 5. Nothing recognisable
        // ---------------------------------------------------------------
        GoldenBody {
            name: "unknown_object",
            raw: r#"{"status":"ok"}"#,
            expected: "",
        },
        GoldenBody {
            name: "empty_object",
            raw: "{}",
            expected: "",
        },
        GoldenBody {
            name: "not_json",
            raw: "Bad Gateway",
            expected: "",
        },
        GoldenBody {
            name: "empty_body",
            raw: "",
            expected: "",
        },
    ]
}

#[test]
fn golden_bodies_resolve_as_expected() {
    for case in golden_bodies() {
        assert_eq!(
            resolve_body(case.raw),
            case.expected,
            "golden body '{}' resolved incorrectly",
            case.name
        );
    }
}

#[test]
fn golden_set_covers_every_shape() {
    let names: Vec<&str> = golden_bodies().iter().map(|c| c.name).collect();
    for shape in ["error", "top_level", "choice_data", "chat_completion", "legacy_completion", "legacy_response", "unknown"] {
        assert!(
            names.iter().any(|n| n.starts_with(shape)),
            "no golden body for shape '{shape}'"
        );
    }
}

#[test]
fn resolution_never_panics_on_odd_types() {
    for raw in [
        r#"{"answer":42}"#,
        r#"{"choices":"nope"}"#,
        r#"{"choices":[null]}"#,
        r#"{"choices":[{"message":{"content":null}}]}"#,
        r#"{"response":["a"]}"#,
        "null",
        "true",
    ] {
        assert_eq!(resolve_body(raw), "", "odd body {raw} should be silent");
    }
}
