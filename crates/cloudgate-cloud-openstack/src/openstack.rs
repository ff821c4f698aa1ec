//! openstack CLI wrapper
//!
//! Implements [`NetworkBackend`] by running the `openstack` client with JSON
//! output. Credentials come from the client's own configuration
//! (`clouds.yaml` or `OS_*` environment variables).

use crate::error::{OpenStackError, Result};
use async_trait::async_trait;
use cloudgate_cloud::{FloatingIp, Network, NetworkBackend, NetworkFilter, Port, PortBinding};
use serde::Deserialize;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;

const PROGRAM: &str = "openstack";

/// openstack CLI wrapper
#[derive(Debug, Clone, Default)]
pub struct OpenStackCli {
    cloud: Option<String>,
    region: Option<String>,
}

impl OpenStackCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a named entry of `clouds.yaml`
    pub fn with_cloud(mut self, cloud: impl Into<String>) -> Self {
        self.cloud = Some(cloud.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn global_args(&self) -> Vec<&str> {
        let mut args = Vec::new();
        if let Some(cloud) = &self.cloud {
            args.push("--os-cloud");
            args.push(cloud.as_str());
        }
        if let Some(region) = &self.region {
            args.push("--os-region-name");
            args.push(region.as_str());
        }
        args
    }

    /// Run an openstack command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let global = self.global_args();
        let mut cmd = Command::new(PROGRAM);
        cmd.args(&global);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", PROGRAM, args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => OpenStackError::CliNotFound(PROGRAM.to_string()),
            _ => OpenStackError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OpenStackError::from_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn create(&self, network_id: &str) -> Result<FloatingIp> {
        let output = self
            .run_command(&["floating", "ip", "create", "-f", "json", network_id])
            .await?;
        parse_floating_ip(&output)
    }

    async fn show(&self, id: &str) -> Result<FloatingIp> {
        let output = self
            .run_command(&["floating", "ip", "show", "-f", "json", id])
            .await?;
        parse_floating_ip(&output)
    }

    async fn bind(&self, id: &str, binding: &PortBinding) -> Result<()> {
        self.run_command(&[
            "floating",
            "ip",
            "set",
            "--port",
            binding.port_id.as_str(),
            "--fixed-ip-address",
            binding.fixed_ip_address.as_str(),
            id,
        ])
        .await?;
        Ok(())
    }

    async fn unbind(&self, id: &str) -> Result<()> {
        self.run_command(&["floating", "ip", "unset", "--port", id])
            .await?;
        Ok(())
    }

    async fn networks(&self, filter: &NetworkFilter) -> Result<Vec<Network>> {
        let mut args = vec!["network", "list", "-f", "json"];
        match filter.router_external {
            Some(true) => args.push("--external"),
            Some(false) => args.push("--internal"),
            None => {}
        }
        if let Some(name) = &filter.name {
            args.push("--name");
            args.push(name.as_str());
        }
        let output = self.run_command(&args).await?;
        Ok(parse_networks(&output, filter.router_external.unwrap_or(false))?
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect())
    }
}

/// Floating IP as printed by `floating ip show` (snake_case keys) or
/// `floating ip list` (column titles)
#[derive(Debug, Clone, Deserialize)]
struct OsFloatingIp {
    #[serde(alias = "ID")]
    id: String,

    #[serde(alias = "Floating IP Address")]
    floating_ip_address: String,

    #[serde(default, alias = "Fixed IP Address")]
    fixed_ip_address: Option<String>,

    #[serde(default, alias = "Port")]
    port_id: Option<String>,

    #[serde(default, alias = "Floating Network")]
    floating_network_id: Option<String>,
}

impl From<OsFloatingIp> for FloatingIp {
    fn from(ip: OsFloatingIp) -> Self {
        Self {
            id: ip.id,
            floating_ip_address: ip.floating_ip_address,
            fixed_ip_address: ip.fixed_ip_address.filter(|v| !v.is_empty()),
            port_id: ip.port_id.filter(|v| !v.is_empty()),
            floating_network_id: ip.floating_network_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OsNetwork {
    #[serde(alias = "ID")]
    id: String,

    #[serde(default, alias = "Name")]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OsPort {
    #[serde(alias = "ID")]
    id: String,

    #[serde(default, alias = "Device ID")]
    device_id: Option<String>,

    #[serde(default, alias = "Device Owner")]
    device_owner: Option<String>,
}

impl From<OsPort> for Port {
    fn from(port: OsPort) -> Self {
        Self {
            id: port.id,
            device_id: port.device_id.filter(|v| !v.is_empty()),
            device_owner: port.device_owner.filter(|v| !v.is_empty()),
        }
    }
}

fn is_empty_list(output: &str) -> bool {
    let trimmed = output.trim();
    trimmed.is_empty() || trimmed == "[]"
}

fn parse_floating_ip(output: &str) -> Result<FloatingIp> {
    let ip: OsFloatingIp = serde_json::from_str(output)?;
    Ok(ip.into())
}

fn parse_floating_ips(output: &str) -> Result<Vec<FloatingIp>> {
    if is_empty_list(output) {
        return Ok(Vec::new());
    }
    let ips: Vec<OsFloatingIp> = serde_json::from_str(output)?;
    Ok(ips.into_iter().map(Into::into).collect())
}

/// `network list` does not print router:external; the caller knows it from
/// the `--external` flag it passed
fn parse_networks(output: &str, router_external: bool) -> Result<Vec<Network>> {
    if is_empty_list(output) {
        return Ok(Vec::new());
    }
    let networks: Vec<OsNetwork> = serde_json::from_str(output)?;
    Ok(networks
        .into_iter()
        .map(|n| Network {
            id: n.id,
            name: n.name,
            router_external,
        })
        .collect())
}

fn parse_ports(output: &str) -> Result<Vec<Port>> {
    if is_empty_list(output) {
        return Ok(Vec::new());
    }
    let ports: Vec<OsPort> = serde_json::from_str(output)?;
    Ok(ports.into_iter().map(Into::into).collect())
}

#[async_trait]
impl NetworkBackend for OpenStackCli {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn create_floating_ip(&self, network_id: &str) -> cloudgate_cloud::Result<FloatingIp> {
        Ok(self.create(network_id).await?)
    }

    async fn delete_floating_ip(&self, id: &str) -> cloudgate_cloud::Result<()> {
        self.run_command(&["floating", "ip", "delete", id]).await?;
        Ok(())
    }

    async fn update_floating_ip_binding(
        &self,
        id: &str,
        binding: Option<&PortBinding>,
    ) -> cloudgate_cloud::Result<()> {
        match binding {
            Some(binding) => self.bind(id, binding).await?,
            None => self.unbind(id).await?,
        }
        Ok(())
    }

    async fn get_floating_ip(&self, id: &str) -> cloudgate_cloud::Result<FloatingIp> {
        Ok(self.show(id).await?)
    }

    async fn list_floating_ips(&self) -> cloudgate_cloud::Result<Vec<FloatingIp>> {
        let output = self
            .run_command(&["floating", "ip", "list", "--long", "-f", "json"])
            .await?;
        Ok(parse_floating_ips(&output)?)
    }

    async fn list_networks(&self, filter: &NetworkFilter) -> cloudgate_cloud::Result<Vec<Network>> {
        Ok(self.networks(filter).await?)
    }

    async fn list_ports(&self) -> cloudgate_cloud::Result<Vec<Port>> {
        let output = self
            .run_command(&[
                "port",
                "list",
                "--long",
                "-c",
                "ID",
                "-c",
                "Device ID",
                "-c",
                "Device Owner",
                "-f",
                "json",
            ])
            .await?;
        Ok(parse_ports(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_output() {
        let output = r#"{
            "created_at": "2026-01-01T00:00:00Z",
            "fixed_ip_address": "10.0.0.5",
            "floating_ip_address": "203.0.113.10",
            "floating_network_id": "net-public",
            "id": "fip-1",
            "port_id": "port-1",
            "status": "ACTIVE"
        }"#;

        let ip = parse_floating_ip(output).unwrap();
        assert_eq!(ip.id, "fip-1");
        assert_eq!(ip.floating_ip_address, "203.0.113.10");
        assert_eq!(ip.port_id.as_deref(), Some("port-1"));
        assert!(ip.is_bound());
    }

    #[test]
    fn test_parse_list_output() {
        let output = r#"[
            {"ID": "fip-1", "Floating IP Address": "203.0.113.10", "Fixed IP Address": null,
             "Port": null, "Floating Network": "net-public", "Project": "p"},
            {"ID": "fip-2", "Floating IP Address": "203.0.113.11", "Fixed IP Address": "10.0.0.6",
             "Port": "port-2", "Floating Network": "net-public", "Project": "p"}
        ]"#;

        let ips = parse_floating_ips(output).unwrap();
        assert_eq!(ips.len(), 2);
        assert!(!ips[0].is_bound());
        assert_eq!(ips[1].fixed_ip_address.as_deref(), Some("10.0.0.6"));
        assert_eq!(ips[1].floating_network_id.as_deref(), Some("net-public"));

        assert!(parse_floating_ips("").unwrap().is_empty());
        assert!(parse_floating_ips("[]\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_networks() {
        let output = r#"[{"ID": "net-1", "Name": "public", "Subnets": ["sub-1"]}]"#;
        let networks = parse_networks(output, true).unwrap();
        assert_eq!(
            networks,
            vec![Network {
                id: "net-1".to_string(),
                name: "public".to_string(),
                router_external: true,
            }]
        );
    }

    #[test]
    fn test_parse_ports_drops_empty_device() {
        let output = r#"[
            {"ID": "port-1", "Device ID": "server-1", "Device Owner": "compute:nova"},
            {"ID": "port-2", "Device ID": "", "Device Owner": ""}
        ]"#;
        let ports = parse_ports(output).unwrap();
        assert_eq!(ports[0].device_id.as_deref(), Some("server-1"));
        assert_eq!(ports[1].device_id, None);
        assert_eq!(ports[1].device_owner, None);
    }

    #[test]
    fn test_global_args() {
        let cli = OpenStackCli::new().with_cloud("devstack").with_region("RegionOne");
        assert_eq!(
            cli.global_args(),
            vec!["--os-cloud", "devstack", "--os-region-name", "RegionOne"]
        );
        assert!(OpenStackCli::new().global_args().is_empty());
    }
}
