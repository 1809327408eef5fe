use std::io::Write;

const SECRET_KEY: &str = "sk-doctor-secret-0000000000000000000000000000";

fn doctor() -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("tonepipe"));
    cmd.arg("doctor")
        .env_remove("TONEPIPE_ENV_FILE")
        .env_remove("TONEPIPE_OPENAI_API_KEY")
        .env_remove("TONEPIPE_MANAGED_API_KEY")
        .env_remove("TONEPIPE_PROXIES")
        .env_remove("TONEPIPE_FALLBACK_CONTENT")
        .env_remove("TONEPIPE_OPENAI_BASE_URL")
        .env_remove("TONEPIPE_OPENAI_MODEL");
    cmd
}

fn run_json(cmd: &mut std::process::Command) -> (serde_json::Value, String) {
    let out = cmd.output().expect("run tonepipe doctor");
    assert!(out.status.success(), "tonepipe doctor failed");
    let s = String::from_utf8_lossy(&out.stdout).to_string();
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    (v, s)
}

#[test]
fn tonepipe_doctor_contract_defaults() {
    let (v, _) = run_json(&mut doctor());

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("doctor"));
    assert_eq!(v["name"].as_str(), Some("tonepipe"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert!(v.get("elapsed_ms").is_some());

    assert_eq!(v["configured"]["credentials"]["user_key"].as_bool(), Some(false));
    assert_eq!(v["configured"]["credentials"]["managed_key"].as_bool(), Some(false));
    assert_eq!(v["configured"]["scorer"]["base_url"].as_str(), Some("https://api.openai.com"));
    assert_eq!(v["configured"]["scorer"]["model"].as_str(), Some("gpt-4"));
    assert_eq!(v["configured"]["fallback_content"].as_str(), Some("refetch"));

    let proxies = v["configured"]["proxies"].as_array().expect("proxies array");
    assert_eq!(proxies.len(), 4);
    assert_eq!(proxies[0].as_str(), Some("https://api.allorigins.win/get?url="));
}

#[test]
fn tonepipe_doctor_reports_bad_config_without_leaking_secrets() {
    let mut env_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(env_file, "# local overrides").unwrap();
    writeln!(env_file, "TONEPIPE_MANAGED_API_KEY={SECRET_KEY}").unwrap();
    writeln!(env_file, "TONEPIPE_FALLBACK_CONTENT=reuse").unwrap();

    let (v, raw) = run_json(
        doctor()
            .env("TONEPIPE_ENV_FILE", env_file.path())
            .env("TONEPIPE_PROXIES", "direct,bogus")
            .env("TONEPIPE_OPENAI_API_KEY", "not-a-key"),
    );

    assert!(!raw.contains(SECRET_KEY));
    assert!(!raw.contains("not-a-key"));
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["configured"]["credentials"]["managed_key"].as_bool(), Some(true));
    assert_eq!(v["configured"]["fallback_content"].as_str(), Some("reuse"));
    assert!(v["configured"]["proxies"].is_null());

    let checks = v["checks"].as_array().expect("checks array");
    let find = |name: &str| {
        checks
            .iter()
            .find(|c| c["name"].as_str() == Some(name))
            .unwrap_or_else(|| panic!("{name} check"))
    };
    assert_eq!(find("proxy_chain")["ok"].as_bool(), Some(false));
    assert!(find("proxy_chain")["error"]
        .as_str()
        .unwrap_or("")
        .contains("bogus"));
    assert_eq!(find("user_api_key_format")["ok"].as_bool(), Some(false));
    assert_eq!(find("analyzer_config")["ok"].as_bool(), Some(true));
}
