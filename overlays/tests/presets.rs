//! Every shipped preset must load, validate and drive a pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lib_overlay::{BindingSet, MemorySink, Pipeline, RawMessage, Tweener};

fn preset(name: &str) -> BindingSet {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("presets")
        .join(name);
    BindingSet::from_file(&path).unwrap()
}

fn gameplay_frame() -> RawMessage {
    RawMessage::Text(
        serde_json::json!({
            "state": 2,
            "status": 2,
            "playtime": 187_000,
            "current_pp": 304.6,
            "fc_pp": 350.12,
            "stars_mods": 5.274,
            "unstable_rate": 123.456,
            "beatmap": {
                "last_obj_time": 200_000,
                "paths": { "background_path_full": "575767 BTS - Not Today/bg.jpg" }
            },
            "gameplay": { "hit_100": 3, "hit_50": 0, "hit_miss": 1, "slider_breaks": 0 }
        })
        .to_string(),
    )
}

fn run(name: &str) -> Pipeline<MemorySink, Tweener> {
    let mut pipeline = Pipeline::new(Arc::new(preset(name)), MemorySink::new(), Tweener::new());
    pipeline.handle_message(&gameplay_frame()).unwrap();
    pipeline.frame(Instant::now() + Duration::from_secs(5));
    pipeline
}

#[test]
fn test_all_presets_load_with_endpoints() {
    for name in ["ingame.json", "unstable_rate.json", "dark_and_white.json", "maximal_lime.json"] {
        let set = preset(name);
        assert!(!set.is_empty(), "{}", name);
        assert!(set.endpoint.is_some(), "{}", name);
    }
}

#[test]
fn test_ingame_preset() {
    let p = run("ingame.json");
    let sink = p.dispatcher().sink();
    assert_eq!(sink.visibility_state("wrapper"), Some("translateX(0)"));
    assert_eq!(sink.text("pp"), Some("304.60"));
    assert_eq!(sink.text("ifFcpp"), Some("350.12"));
    assert_eq!(sink.visibility_state("ifFcpp"), Some("opacity:1"));
    assert_eq!(sink.text("hun"), Some("3.00"));
    assert_eq!(sink.text("fiv"), Some("0.00"));
    assert_eq!(sink.text("miss"), Some("1.00"));
}

#[test]
fn test_unstable_rate_preset() {
    let p = run("unstable_rate.json");
    let sink = p.dispatcher().sink();
    assert_eq!(sink.visible("ur"), Some(true));
    assert_eq!(sink.text("ur"), Some("123.46"));
}

#[test]
fn test_maximal_lime_preset() {
    let p = run("maximal_lime.json");
    let sink = p.dispatcher().sink();
    assert_eq!(
        sink.attribute("bg", "src"),
        Some("http://127.0.0.1:9001/Songs/575767 BTS - Not Today/bg.jpg")
    );
    assert_eq!(sink.text("time"), Some("3m 7s"));
    assert_eq!(sink.text("pp"), Some("305pp"));
    assert_eq!(sink.text("star_span"), Some("5.27"));
    assert_eq!(sink.text("h0"), Some("1"));
}

#[test]
fn test_maximal_lime_clock_waits_for_first_second() {
    let mut p = Pipeline::new(Arc::new(preset("maximal_lime.json")), MemorySink::new(), Tweener::new());
    p.handle_message(&RawMessage::from(r#"{"playtime": 400}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().text("time"), None);

    p.handle_message(&RawMessage::from(r#"{"playtime": 42000}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().text("time"), Some("42s"));

    // A restart below one second keeps the last reading.
    p.handle_message(&RawMessage::from(r#"{"playtime": 0}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().text("time"), Some("42s"));
}

#[test]
fn test_dark_and_white_preset() {
    let p = run("dark_and_white.json");
    let sink = p.dispatcher().sink();
    assert_eq!(sink.visibility_state("body"), Some("class:"));
    assert_eq!(sink.text("pp"), Some("305"));
    assert_eq!(sink.text("h100"), Some("3"));
    assert_eq!(sink.attribute("root", "--progress"), Some("93.50%"));
}

#[test]
fn test_dark_and_white_body_ignores_state_seven() {
    let mut p = Pipeline::new(Arc::new(preset("dark_and_white.json")), MemorySink::new(), Tweener::new());
    p.handle_message(&RawMessage::from(r#"{"state": 5}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().visibility_state("body"), Some("class:songSelect"));

    p.handle_message(&RawMessage::from(r#"{"state": 2}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().visibility_state("body"), Some("class:"));

    p.handle_message(&RawMessage::from(r#"{"state": 7}"#)).unwrap();
    assert_eq!(p.dispatcher().sink().visibility_state("body"), Some("class:"));
}
