fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use flux_protocol::{
        ClientMessage, Cursors, FinalStatus, PathSegment, Position, ResumeRequest, ServerMessage,
        StartRequest,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The server writes `1` where Rust writes `1.0` for an `f64`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) if n.is_f64() => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => serde_json::json!(f as i64),
                _ => v.clone(),
            },
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Decodes a server fixture the way the client does, re-serializes it
    /// and compares the JSON values.
    fn server_roundtrip(name: &str) -> ServerMessage {
        let fixture = load_fixture(name);
        let parsed = ServerMessage::decode(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  client: {reserialized}"
        );
        parsed
    }

    /// Checks that the client encodes `msg` exactly as the fixture.
    fn client_matches(name: &str, msg: &ClientMessage) {
        let encoded: serde_json::Value =
            serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(encoded, load_fixture(name), "encoding mismatch for {name}");

        let decoded: ClientMessage = serde_json::from_value(load_fixture(name)).unwrap();
        assert_eq!(&decoded, msg);
    }

    fn cursors() -> Cursors {
        Cursors::new()
            .with("build", Position::Number(42))
            .with("web", Position::Token("1717000000000-3".into()))
    }

    // --- Client frames ---

    #[test]
    fn fixture_client_deploy() {
        client_matches(
            "client_deploy.json",
            &ClientMessage::Deploy(StartRequest {
                token: "tok_3f9a".into(),
                branch: "main".into(),
                fluxfile: "jobs:\n  build:\n    image: rust:1.85\n".into(),
            }),
        );
    }

    #[test]
    fn fixture_client_follow() {
        client_matches(
            "client_follow.json",
            &ClientMessage::Follow(ResumeRequest {
                token: "tok_3f9a".into(),
                deployment_id: "dep_01HZX".into(),
                cursors: Some(cursors()),
            }),
        );
    }

    #[test]
    fn fixture_client_follow_without_cursor() {
        client_matches(
            "client_follow_no_cursor.json",
            &ClientMessage::Follow(ResumeRequest {
                token: "tok_3f9a".into(),
                deployment_id: "dep_01HZX".into(),
                cursors: None,
            }),
        );
    }

    // --- Server frames ---

    #[test]
    fn fixture_server_set_id() {
        let ServerMessage::SetId(assign) = server_roundtrip("server_set_id.json") else {
            panic!("expected set_id");
        };
        assert_eq!(assign.deployment_id, "dep_01HZX");
    }

    #[test]
    fn fixture_server_update() {
        let ServerMessage::Update(update) = server_roundtrip("server_update.json") else {
            panic!("expected update");
        };
        assert_eq!(update.step, "Building images");
        assert_eq!(update.progress.step, 0.5);
        assert_eq!(update.progress.sub_step, 0.25);
        assert!(!update.is_done);
        assert_eq!(update.cursors, Some(cursors()));

        // Server order, not alphabetical.
        let components: Vec<_> = update.logs.iter().map(|l| l.component.as_str()).collect();
        assert_eq!(components, ["web", "api"]);
        assert_eq!(update.logs[0].data, b"Step 1/4 : FROM rust\n");
        assert_eq!(update.logs[1].data, b"\x1b[32mok\x1b[0m\n");
    }

    #[test]
    fn fixture_server_update_done() {
        let ServerMessage::Update(update) = server_roundtrip("server_update_done.json") else {
            panic!("expected update");
        };
        assert!(update.is_done);
        assert_eq!(update.status, Some(FinalStatus::Success));
        assert!(update.is_success());
        assert!(update.logs.is_empty());
    }

    #[test]
    fn fixture_server_error() {
        let ServerMessage::Error(report) = server_roundtrip("server_error.json") else {
            panic!("expected error");
        };
        assert_eq!(report.message(), "Invalid Fluxfile");
        assert_eq!(report.details.len(), 2);
        assert_eq!(
            report.details[0].path,
            [
                PathSegment::Key("jobs".into()),
                PathSegment::Key("build".into()),
                PathSegment::Key("services".into()),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(report.details[0].location(), "jobs.build.services[0]");
        assert_eq!(report.details[1].location(), "jobz");
    }

    #[test]
    fn all_fixtures_are_covered() {
        let mut names: Vec<_> = fs::read_dir(fixtures_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            [
                "client_deploy.json",
                "client_follow.json",
                "client_follow_no_cursor.json",
                "server_error.json",
                "server_set_id.json",
                "server_update.json",
                "server_update_done.json",
            ]
        );
    }
}
