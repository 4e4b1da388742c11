use anyhow::{Context, Result, bail};
use fleetkit::Server;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load the server registry from a JSON file.
///
/// The registry is immutable for the lifetime of an operation; every
/// command loads it once and filters before dispatching.
pub fn load_servers(path: &Path) -> Result<Vec<Server>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read server registry {}", path.display()))?;
    let servers: Vec<Server> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid server registry {}", path.display()))?;

    let mut seen = HashSet::new();
    for server in &servers {
        if !seen.insert(server.id.as_str()) {
            bail!(
                "duplicate server id '{}' in {}",
                server.id,
                path.display()
            );
        }
    }

    log::debug!("loaded {} servers from {}", servers.len(), path.display());
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetkit::ServerType;
    use std::io::Write;

    fn write_registry(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_load_servers() {
        let file = write_registry(
            r#"[
                {"id": "b1", "name": "build-1", "type": "build", "address": "10.0.0.1"},
                {"id": "c1", "name": "compute-1", "type": "compute", "address": "10.0.0.11"}
            ]"#,
        );

        let servers = load_servers(file.path()).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].id, "b1");
        assert_eq!(servers[0].kind, ServerType::Build);
        assert_eq!(servers[1].address, "10.0.0.11");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_servers(Path::new("/no/such/servers.json")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let file = write_registry(
            r#"[{"id": "x", "name": "x", "type": "mainframe", "address": "10.0.0.1"}]"#,
        );
        assert!(load_servers(file.path()).is_err());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let file = write_registry(
            r#"[
                {"id": "c1", "name": "compute-1", "type": "compute", "address": "10.0.0.11"},
                {"id": "c1", "name": "compute-1b", "type": "compute", "address": "10.0.0.12"}
            ]"#,
        );

        let err = load_servers(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate server id"));
    }
}
