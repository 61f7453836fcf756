mod common;

use common::MemoryLoader;
use k8s_template::config::Mode;
use k8s_template::error::Error;
use k8s_template::mapping::{parse_records, Kinds, Record, Source};
use k8s_template::renderer::Renderer;
use k8s_template::resolver::{MappingResolver, Resolved};

fn resolve_with(loader: &MemoryLoader, content: &str) -> k8s_template::error::Result<Vec<(String, String)>> {
    let renderer = Renderer::new(loader);
    let records = parse_records(content)?;
    let resolution = MappingResolver::new(&renderer, Mode::Substitute, 16).resolve(records)?;
    Ok(resolution.mapping.into_iter().collect())
}

fn value_of(pairs: &[(String, String)], name: &str) -> String {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()).unwrap()
}

#[test_log::test]
fn test_literal_substitution() {
    let loader = MemoryLoader::new();
    let pairs = resolve_with(
        &loader,
        "- {name: Host, value: example.com}\n- {name: URL, value: 'https://{{.Host}}/x'}",
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "Host"), "example.com");
    assert_eq!(value_of(&pairs, "URL"), "https://example.com/x");
}

#[test_log::test]
fn test_self_reference_any_order() {
    let loader = MemoryLoader::new();
    for content in [
        "- {name: A, value: '{{.B}}'}\n- {name: B, value: leaf}",
        "- {name: B, value: leaf}\n- {name: A, value: '{{.B}}'}",
    ] {
        let pairs = resolve_with(&loader, content).unwrap();
        assert_eq!(value_of(&pairs, "A"), "leaf");
        assert_eq!(value_of(&pairs, "B"), "leaf");
    }
}

#[test]
fn test_chain_closes() {
    let loader = MemoryLoader::new();
    let pairs = resolve_with(
        &loader,
        "- {name: A, value: '{{.B}}-a'}\n- {name: B, value: '{{.C}}-b'}\n- {name: C, value: c}",
    )
    .unwrap();
    assert_eq!(value_of(&pairs, "A"), "c-b-a");
}

#[test]
fn test_last_definition_wins() {
    let loader = MemoryLoader::new();
    let pairs =
        resolve_with(&loader, "- {name: A, value: one}\n- {name: A, value: two}").unwrap();
    assert_eq!(pairs, vec![("A".to_string(), "two".to_string())]);
}

#[test]
fn test_env_entries() {
    let loader = MemoryLoader::new().with_env("STAGE", "qa").with_env("REGION", "eu");
    let pairs = resolve_with(
        &loader,
        "- {name: Stage, value: STAGE, env: true}\n- {name: REGION, env: true}\n- {name: Unset, value: NOPE, env: true}",
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "Stage"), "qa");
    assert_eq!(value_of(&pairs, "REGION"), "eu");
    assert_eq!(value_of(&pairs, "Unset"), "");
}

#[test]
fn test_env_names_file_or_uri() {
    let loader = MemoryLoader::new()
        .with_env("KEYFILE", "/keys/id")
        .with_env("CONFIG_URL", "https://config.local/qa")
        .with_file("/keys/id", "SECRET")
        .with_uri("https://config.local/qa", "remote");
    let pairs = resolve_with(
        &loader,
        r#"
- {name: Key, value: KEYFILE, env: true, file: true}
- {name: Remote, value: CONFIG_URL, env: true, uri: true}
- {name: Encoded, value: KEYFILE, env: true, file: true, base64: true}
"#,
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "Key"), "SECRET");
    assert_eq!(value_of(&pairs, "Remote"), "remote");
    assert_eq!(value_of(&pairs, "Encoded"), "U0VDUkVU");
}

#[test]
fn test_env_file_kinds_in_preprocess() {
    let loader = MemoryLoader::new().with_env("KEYFILE", "/keys/id");
    let renderer = Renderer::new(&loader);
    let records = parse_records("- {name: Key, value: KEYFILE, env: true, file: true}").unwrap();
    let resolution = MappingResolver::new(&renderer, Mode::Preprocess, 16).resolve(records).unwrap();

    assert_eq!(resolution.mapping["Key"], "/keys/id");
    assert_eq!(resolution.kinds["Key"], Kinds { file: true, uri: false, base64: false });
    assert!(resolution.entries[0].env && resolution.entries[0].file);
}

#[test]
fn test_file_and_base64_entries() {
    let loader = MemoryLoader::new()
        .with_env("HOME", "/home/u")
        .with_file("/home/u/tls.crt", "CERT")
        .with_file("/etc/app/qa.conf", "qa config");
    let pairs = resolve_with(
        &loader,
        r#"
- {name: Cert, value: ~/tls.crt, file: true, base64: true}
- {name: Conf, value: "/etc/app/{{.Stage}}.conf", file: true}
- {name: Stage, value: qa}
- {name: Token, value: "secret-{{.Stage}}", base64: true}
"#,
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "Cert"), "Q0VSVA==");
    assert_eq!(value_of(&pairs, "Conf"), "qa config");
    assert_eq!(value_of(&pairs, "Token"), "c2VjcmV0LXFh");
}

#[test]
fn test_deferred_entry_not_visible_until_loaded() {
    let loader = MemoryLoader::new().with_file("/srv/qa.txt", "payload");
    let pairs = resolve_with(
        &loader,
        r#"
- {name: Body, value: "/srv/{{.Stage}}.txt", file: true}
- {name: Wrapped, value: "[{{.Body}}]"}
- {name: Stage, value: qa}
"#,
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "Wrapped"), "[payload]");
}

#[test]
fn test_uri_entries() {
    let loader = MemoryLoader::new().with_uri("https://config.local/qa", "remote");
    let pairs = resolve_with(
        &loader,
        "- {name: Stage, value: qa}\n- {name: Remote, value: 'https://config.local/{{.Stage}}', uri: true}",
    )
    .unwrap();
    assert_eq!(value_of(&pairs, "Remote"), "remote");

    let result = resolve_with(&loader, "- {name: R, value: 'ftp://config.local/x', uri: true}");
    assert!(matches!(result, Err(Error::ConfigError(_))));

    let result = resolve_with(&loader, "- {name: R, value: 'https://config.local/none', uri: true}");
    assert!(matches!(result, Err(Error::FetchError { .. })));
}

#[test]
fn test_missing_file_is_fatal() {
    let loader = MemoryLoader::new();
    let result = resolve_with(&loader, "- {name: F, value: /nowhere, file: true}");
    assert!(matches!(result, Err(Error::FileReadError { .. })));
}

#[test]
fn test_unresolvable_entry_kept() {
    let loader = MemoryLoader::new();
    let pairs = resolve_with(
        &loader,
        "- {name: A, value: 'x {{.Nope}}'}\n- {name: F, value: '/srv/{{.Nope}}', file: true}",
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "A"), "x {{.Nope}}");
    assert_eq!(value_of(&pairs, "F"), "/srv/{{.Nope}}");
}

#[test]
fn test_scoped_fragments_across_passes() {
    let loader = MemoryLoader::new();
    let pairs = resolve_with(
        &loader,
        r#"
- {name: A, value: '{{ $h := "x" }}{{ if .Later }}{{ $h }}{{ end }}'}
- {name: B, value: '{{ range split "p q" }}[{{ $.Later }}]{{ end }}'}
- {name: C, value: '{{ range split "p q" }}[{{ .Later }}]{{ end }}'}
- {name: Later, value: L}
"#,
    )
    .unwrap();

    assert_eq!(value_of(&pairs, "A"), "x");
    assert_eq!(value_of(&pairs, "B"), "[L][L]");
    // Inside a range dot is the item, never the mapping
    assert_eq!(value_of(&pairs, "C"), r#"{{ range split "p q" }}[{{ .Later }}]{{ end }}"#);
}

#[test]
fn test_growing_cycle_detected() {
    let loader = MemoryLoader::new();
    let result = resolve_with(
        &loader,
        "- {name: A, value: '{{.B}}a'}\n- {name: B, value: '{{.A}}b'}",
    );
    assert!(matches!(result, Err(Error::CycleError { .. })));
}

#[test]
fn test_preprocess_mode_skips_loads() {
    let loader = MemoryLoader::new();
    let renderer = Renderer::new(&loader);
    let resolver = MappingResolver::new(&renderer, Mode::Preprocess, 16);

    let record = Record::new("Cert", Source::File("/not/read".to_string())).with_base64(true);
    let resolved = resolver.resolve_entry(&record, &Default::default()).unwrap();
    assert_eq!(resolved, Resolved::Ready("/not/read".to_string()));
}

#[test]
fn test_resolve_entry_defers_open_input() {
    let loader = MemoryLoader::new();
    let renderer = Renderer::new(&loader);
    let resolver = MappingResolver::new(&renderer, Mode::Substitute, 16);

    let record = Record::new("Conf", Source::File("/etc/{{.Stage}}".to_string()));
    match resolver.resolve_entry(&record, &Default::default()).unwrap() {
        Resolved::Deferred(pending) => {
            assert_eq!(pending.source, Source::File("/etc/{{.Stage}}".to_string()))
        }
        other => panic!("Expected a deferred entry, got {other:?}"),
    }
}

#[test]
fn test_entries_metadata() {
    let loader = MemoryLoader::new().with_env("STAGE", "qa");
    let renderer = Renderer::new(&loader);
    let records =
        parse_records("- {name: Stage, value: STAGE, env: true}\n- {name: T, value: tok, base64: true}")
            .unwrap();
    let resolution = MappingResolver::new(&renderer, Mode::Substitute, 16).resolve(records).unwrap();

    assert_eq!(
        resolution.entries[0].to_string(),
        "name: Stage len(value): 2 base64: false file: false env: true uri: false"
    );
    assert_eq!(resolution.entries[1].len, "dG9r".len());
}
