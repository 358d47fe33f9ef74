//! Pipe-delimited patch service manifests.
//!
//! The `/versions` and `/cdns` endpoints answer with tables of the form
//!
//! ```text
//! Name!STRING:0|Path!STRING:0|Hosts!STRING:0
//! ## seqn = 12345
//! us|tpr/war3|host1.example host2.example
//! ```
//!
//! Column names carry a `!Type:Width` suffix that is stripped; comment
//! lines start with `#`; rows with fewer fields than the header are
//! skipped.

use crate::{Error, Result};

/// Version table entry (from `/versions`)
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntry {
    /// Region code
    pub region: String,
    /// Build configuration hash
    pub build_config: String,
    /// CDN configuration hash
    pub cdn_config: String,
    /// Build ID number
    pub build_id: u32,
    /// Human-readable version name
    pub versions_name: String,
}

/// CDN table entry (from `/cdns`)
#[derive(Debug, Clone, PartialEq)]
pub struct CdnEntry {
    /// CDN name, matched against region codes
    pub name: String,
    /// Content path prefix on the host (e.g. `tpr/war3`)
    pub path: String,
    /// CDN hostnames
    pub hosts: Vec<String>,
    /// CDN server URLs; an alternative to `hosts`
    pub servers: Vec<String>,
    /// Configuration path on the CDN
    pub config_path: String,
}

impl CdnEntry {
    /// Hosts to try, preferring the `Hosts` column over `Servers`.
    pub fn best_hosts(&self) -> &[String] {
        if self.hosts.is_empty() {
            &self.servers
        } else {
            &self.hosts
        }
    }
}

/// A parsed pipe-delimited table: stripped header names plus field rows.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(content: &str) -> Self {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let headers: Vec<String> = lines
            .next()
            .unwrap_or("")
            .split('|')
            .map(|c| c.split('!').next().unwrap_or("").trim().to_string())
            .collect();

        let rows = lines
            .map(|line| {
                line.split('|')
                    .map(|f| f.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|fields| fields.len() >= headers.len())
            .collect();

        Self { headers, rows }
    }

    fn get<'a>(&self, row: &'a [String], field: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == field)
            .and_then(|i| row.get(i))
            .map(String::as_str)
    }

    fn get_required<'a>(&self, row: &'a [String], field: &'static str) -> Result<&'a str> {
        self.get(row, field).ok_or(Error::MissingField { field })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Parse a `/versions` manifest into typed entries
pub fn parse_versions(content: &str) -> Result<Vec<VersionEntry>> {
    let table = Table::parse(content);
    let mut entries = Vec::new();

    for (line, row) in table.rows.iter().enumerate() {
        let build_id = table.get(row, "BuildId").unwrap_or("0");
        entries.push(VersionEntry {
            region: table.get_required(row, "Region")?.to_string(),
            build_config: table.get_required(row, "BuildConfig")?.to_string(),
            cdn_config: table.get_required(row, "CDNConfig")?.to_string(),
            build_id: build_id.parse().map_err(|_| {
                Error::invalid_manifest(line, format!("invalid BuildId: {build_id}"))
            })?,
            versions_name: table.get(row, "VersionsName").unwrap_or("").to_string(),
        });
    }

    Ok(entries)
}

/// Parse a `/cdns` manifest into typed entries
pub fn parse_cdns(content: &str) -> Result<Vec<CdnEntry>> {
    let table = Table::parse(content);
    let mut entries = Vec::new();

    for row in &table.rows {
        entries.push(CdnEntry {
            name: table.get_required(row, "Name")?.to_string(),
            path: table.get_required(row, "Path")?.to_string(),
            hosts: split_list(table.get(row, "Hosts").unwrap_or("")),
            servers: split_list(table.get(row, "Servers").unwrap_or("")),
            config_path: table.get(row, "ConfigPath").unwrap_or("").to_string(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cdns() {
        let content = "Name!STRING:0|Path!STRING:0|Hosts!STRING:0|Servers!STRING:0|ConfigPath!STRING:0\n\
            ## seqn = 12345\n\
            us|tpr/war3|host1.example host2.example||tpr/configs/data\n\
            eu|tpr/war3|host3.example|http://host3.example/?maxhosts=4|tpr/configs/data\n";

        let entries = parse_cdns(content).unwrap();
        assert_eq!(entries.len(), 2);

        let us = &entries[0];
        assert_eq!(us.name, "us");
        assert_eq!(us.path, "tpr/war3");
        assert_eq!(us.hosts, vec!["host1.example", "host2.example"]);
        assert!(us.servers.is_empty());
        assert_eq!(us.best_hosts(), &us.hosts[..]);

        let eu = &entries[1];
        assert_eq!(eu.servers, vec!["http://host3.example/?maxhosts=4"]);
    }

    #[test]
    fn test_best_hosts_falls_back_to_servers() {
        let entry = CdnEntry {
            name: "us".into(),
            path: "tpr/war3".into(),
            hosts: vec![],
            servers: vec!["server1.example".into()],
            config_path: String::new(),
        };
        assert_eq!(entry.best_hosts(), &entry.servers[..]);
    }

    #[test]
    fn test_parse_versions() {
        let content = "Region!STRING:0|BuildConfig!HEX:16|CDNConfig!HEX:16|KeyRing!HEX:16|BuildId!DEC:4|VersionsName!String:0|ProductConfig!HEX:16\n\
            us|aabb|ccdd||12345|1.36.0.12345|eeff\n\
            eu|aabb|ccdd||12345|1.36.0.12345|eeff\n";

        let entries = parse_versions(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].region, "us");
        assert_eq!(entries[0].build_config, "aabb");
        assert_eq!(entries[0].cdn_config, "ccdd");
        assert_eq!(entries[0].build_id, 12345);
        assert_eq!(entries[0].versions_name, "1.36.0.12345");
    }

    #[test]
    fn test_short_rows_skipped() {
        let content = "Region!STRING:0|BuildConfig!HEX:16|CDNConfig!HEX:16\n\
            us|aabb|ccdd\n\
            eu|aabb\n";

        let entries = parse_versions(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].region, "us");
    }

    #[test]
    fn test_empty_manifest() {
        assert!(parse_versions("").unwrap().is_empty());
        assert!(parse_cdns("# nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let content =
            "Name!STRING:0|Path!STRING:0|Hosts!STRING:0\r\nus|tpr/war3|host1.example\r\n";
        let entries = parse_cdns(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hosts, vec!["host1.example"]);
    }
}
