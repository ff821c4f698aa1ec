//! Legacy address pool proxy over the aws CLI
//!
//! Forwards standard-domain requests to an EC2-compatible endpoint with
//! `aws ec2 ... --endpoint-url <url> --output json`.

use async_trait::async_trait;
use cloudgate_address::{
    Address, ApiError, AssociateAddressRequest, AssociateAddressResponse, LegacyAddressApi, Result,
};
use cloudgate_cloud::CloudError;
use serde::Deserialize;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;

const PROGRAM: &str = "aws";

/// aws CLI wrapper for the legacy pool
#[derive(Debug, Clone)]
pub struct Ec2Cli {
    endpoint_url: String,
    region: Option<String>,
}

impl Ec2Cli {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn base_args(&self) -> Vec<&str> {
        let mut args = vec!["ec2", "--endpoint-url", self.endpoint_url.as_str()];
        if let Some(region) = &self.region {
            args.push("--region");
            args.push(region.as_str());
        }
        args.push("--output");
        args.push("json");
        args
    }

    /// Run an aws ec2 command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(PROGRAM);
        cmd.args(self.base_args());
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} ec2 {}", PROGRAM, args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ApiError::Backend(CloudError::CommandFailed(format!(
                "{} not found. Please install the AWS CLI",
                PROGRAM
            ))),
            _ => ApiError::Backend(CloudError::Io(e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(parse_error(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Translate `An error occurred (<Code>) when calling ...: <message>`
fn parse_error(stderr: &str) -> ApiError {
    let parsed = stderr.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("An error occurred (")?;
        let (code, rest) = rest.split_once(')')?;
        let message = rest.split_once(": ").map(|(_, m)| m).unwrap_or(rest);
        Some((code.to_string(), message.trim().to_string()))
    });
    match parsed {
        Some((code, message)) => ApiError::Legacy { code, message },
        None => ApiError::Backend(CloudError::CommandFailed(stderr.trim().to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AllocateOutput {
    public_ip: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssociateOutput {
    #[serde(default)]
    association_id: Option<String>,
}

fn parse_json<T: for<'de> Deserialize<'de>>(output: &str) -> Result<T> {
    serde_json::from_str(output).map_err(|e| ApiError::Backend(CloudError::Json(e)))
}

#[async_trait]
impl LegacyAddressApi for Ec2Cli {
    async fn allocate(&self) -> Result<Address> {
        let output = self.run_command(&["allocate-address"]).await?;
        let allocated: AllocateOutput = parse_json(&output)?;
        Ok(Address::standard(allocated.public_ip))
    }

    async fn associate(
        &self,
        request: &AssociateAddressRequest,
    ) -> Result<AssociateAddressResponse> {
        let mut args = vec!["associate-address"];
        let pairs = [
            ("--public-ip", &request.public_ip),
            ("--instance-id", &request.instance_id),
            ("--network-interface-id", &request.network_interface_id),
            ("--private-ip-address", &request.private_ip_address),
        ];
        for (flag, value) in pairs {
            if let Some(value) = value {
                args.push(flag);
                args.push(value.as_str());
            }
        }
        if request.allow_reassociation {
            args.push("--allow-reassociation");
        }

        let output = self.run_command(&args).await?;
        let associated: AssociateOutput = if output.trim().is_empty() {
            AssociateOutput::default()
        } else {
            parse_json(&output)?
        };
        Ok(AssociateAddressResponse {
            success: true,
            association_id: associated.association_id,
        })
    }

    async fn disassociate(&self, public_ip: &str) -> Result<bool> {
        self.run_command(&["disassociate-address", "--public-ip", public_ip])
            .await?;
        Ok(true)
    }

    async fn release(&self, public_ip: &str) -> Result<bool> {
        self.run_command(&["release-address", "--public-ip", public_ip])
            .await?;
        Ok(true)
    }
}
