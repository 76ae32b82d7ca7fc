//! Status command implementation

use crate::balancer::BalancerStatus;
use crate::cli::output::{format_status, format_status_json};
use crate::cli::StatusArgs;
use std::time::Duration;

/// Handle `fulcrum status` command
///
/// Fetches `/status` from the admin listener of a running instance.
pub async fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let url = format!("{}/status", args.admin.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Cannot reach admin listener at {}: {}", args.admin, e))?;
    if !response.status().is_success() {
        return Err(format!("{} returned {}", url, response.status()).into());
    }

    let status: BalancerStatus = response.json().await?;
    if args.json {
        Ok(format_status_json(&status)?)
    } else {
        Ok(format_status(&status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::LoadBalancer;
    use crate::registry::Backend;
    use crate::routing::create_strategy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn admin_serving_status() -> MockServer {
        let balancer = LoadBalancer::new(create_strategy("random").unwrap());
        balancer
            .add_backend(Backend::parse("http://10.1.1.1:8000", 1).unwrap())
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(balancer.status()))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_status_renders_table() {
        let server = admin_serving_status().await;
        let args = StatusArgs {
            admin: server.uri(),
            json: false,
        };

        let output = handle_status(&args).await.unwrap();
        assert!(output.contains("http://10.1.1.1:8000"));
        assert!(output.contains("Random"));
    }

    #[tokio::test]
    async fn test_status_json_output() {
        let server = admin_serving_status().await;
        let args = StatusArgs {
            admin: format!("{}/", server.uri()),
            json: true,
        };

        let output = handle_status(&args).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["strategy_kind"], "random");
    }

    #[tokio::test]
    async fn test_status_unreachable_admin() {
        let args = StatusArgs {
            admin: "http://127.0.0.1:1".to_string(),
            json: false,
        };
        let err = handle_status(&args).await.unwrap_err();
        assert!(err.to_string().contains("Cannot reach admin listener"));
    }
}
