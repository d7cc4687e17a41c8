//! Configuration-driven graph tests
//!
//! Loads channel graphs from TOML files on disk and checks both the graph that comes out
//! and the errors for configurations that cannot be built.

use daq_channels::config::RuntimeConfig;
use daq_channels::graph;
use daq_channels::{ChannelError, Runtime};
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(text: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const FRAMED_RIG: &str = r#"
[application]
name = "framed rig"
log_level = "debug"

[[channels]]
name = "frames"
kind = "pattern"
setup = ["<", ">"]
links = ["fields"]

[[channels]]
name = "fields"
kind = "splitter"
setup = [",", ";", "x", "y"]

[[channels]]
name = "x"
kind = "buffer"
setup = ["16"]
links = ["x_text"]

[[channels]]
name = "y"
kind = "buffer"
setup = ["16"]
links = ["y_text"]

[[channels]]
name = "x_text"
kind = "format"
setup = ["x=%d"]

[[channels]]
name = "y_text"
kind = "format"
setup = ["y=%d"]

[[channels]]
name = "both"
kind = "group"
setup = ["x_text", "y_text"]
"#;

#[test]
fn graph_from_file_processes_frames() {
    let file = config_file(FRAMED_RIG);
    let config = RuntimeConfig::load_from(file.path()).unwrap();
    assert_eq!(config.application.log_level, "debug");

    let rt = Runtime::with_std_channels();
    let report = graph::build(&rt, &config).unwrap();
    assert_eq!(report.created.len(), 7);
    assert_eq!(report.links, 3);
    assert_eq!(report.id("frames"), Some(rt.lookup("frames")));

    let frames = rt.lookup("frames");
    rt.write_string(frames, "..<3,4;>..<5,");
    assert_eq!(rt.read_string(rt.lookup("both")), "x=3 y=4");
    rt.write_string(frames, "6;>");
    assert_eq!(rt.read_string(rt.lookup("both")), "x=5 y=6");
}

#[test]
fn disabled_channels_are_skipped() {
    let file = config_file(
        r#"
        [[channels]]
        name = "live"
        kind = "buffer"

        [[channels]]
        name = "spare"
        kind = "parser"
        enabled = false
        "#,
    );
    let config = RuntimeConfig::load_from(file.path()).unwrap();
    let rt = Runtime::with_std_channels();
    let report = graph::build(&rt, &config).unwrap();

    assert_eq!(report.disabled, vec!["spare".to_string()]);
    assert!(rt.lookup("spare").is_none());
    assert!(!rt.lookup("live").is_none());
}

#[test]
fn setup_may_name_channels_declared_later() {
    let file = config_file(
        r#"
        [[channels]]
        name = "fanout"
        kind = "branch"
        setup = ["a", "b"]

        [[channels]]
        name = "a"
        kind = "buffer"

        [[channels]]
        name = "b"
        kind = "buffer"
        "#,
    );
    let config = RuntimeConfig::load_from(file.path()).unwrap();
    let rt = Runtime::with_std_channels();
    graph::build(&rt, &config).unwrap();

    rt.write_string(rt.lookup("fanout"), "hi");
    assert_eq!(rt.read_string(rt.lookup("a")), "hi");
    assert_eq!(rt.read_string(rt.lookup("b")), "hi");
}

#[test]
fn invalid_configurations_are_rejected() {
    let cases = [
        (
            r#"
            [[channels]]
            name = "a"
            kind = "buffer"
            links = ["ghost"]
            "#,
            "undeclared link",
        ),
        (
            r#"
            [[channels]]
            name = "a"
            kind = "buffer"

            [[channels]]
            name = "a"
            kind = "pattern"
            "#,
            "duplicate name",
        ),
        (
            r#"
            [[channels]]
            name = "a"
            kind = "oscilloscope"
            "#,
            "unknown kind",
        ),
        (
            r#"
            [application]
            log_format = "xml"
            "#,
            "bad log format",
        ),
    ];

    for (text, what) in cases {
        let file = config_file(text);
        let config = RuntimeConfig::load_from(file.path()).unwrap();
        let rt = Runtime::with_std_channels();
        assert!(graph::build(&rt, &config).is_err(), "{what} was accepted");
    }
}

#[test]
fn malformed_toml_is_a_config_error() {
    let file = config_file("[[channels]\nname = ");
    let err = RuntimeConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ChannelError::Config(_)));
}

#[test]
fn missing_required_field_is_a_config_error() {
    let file = config_file(
        r#"
        [[channels]]
        name = "kindless"
        "#,
    );
    assert!(matches!(
        RuntimeConfig::load_from(file.path()),
        Err(ChannelError::Config(_))
    ));
}

#[test]
fn environment_overrides_the_file() {
    let file = config_file(FRAMED_RIG);
    std::env::set_var("DAQ_CHANNELS_APPLICATION__NAME", "night shift");
    let config = RuntimeConfig::load_from(file.path());
    std::env::remove_var("DAQ_CHANNELS_APPLICATION__NAME");

    let config = config.unwrap();
    assert_eq!(config.application.name, "night shift");
    assert_eq!(config.application.log_level, "debug");
}

#[test]
fn shipped_sample_config_runs() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/channels.toml");
    let config = RuntimeConfig::load_from(path).unwrap();
    let rt = Runtime::with_std_channels();
    let report = graph::build(&rt, &config).unwrap();
    assert!(report.disabled.contains(&"scope".to_string()));

    rt.write_string(rt.lookup("frames"), "<21.5,1013;>");
    assert_eq!(rt.read_string(rt.lookup("readings")), "T=21.5 C P=1013 hPa");

    let calibrated = rt.lookup("calibrated");
    let check = daq_channels::Params::texts(["s", "temperature_text", "T=21.5 C"]);
    assert_eq!(rt.read_with(calibrated, &check).map(|v| v.as_int()), Some(1));
}
