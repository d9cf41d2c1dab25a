use anyhow::Result;

use crate::OracleConfig;

pub fn check_oracle(cfg: &OracleConfig) -> Result<()> {
    let url = reqwest::Url::parse(&cfg.endpoint)
        .map_err(|e| anyhow::anyhow!("advisory.endpoint invalid: {}", e))?;
    anyhow::ensure!(matches!(url.scheme(), "http" | "https"), "advisory.endpoint must be http(s)");
    anyhow::ensure!(!cfg.model.trim().is_empty(), "advisory.model missing");
    let timeout = cfg.timeout();
    anyhow::ensure!(
        timeout.as_millis() >= 100 && timeout.as_secs() <= 120,
        "advisory.timeout_ms should be 100..120000"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes() {
        check_oracle(&OracleConfig::default()).unwrap();
    }

    #[test]
    fn rejects_bad_endpoint_and_timeout() {
        let cfg = OracleConfig { endpoint: "localhost:11434".into(), ..Default::default() };
        assert!(check_oracle(&cfg).is_err());

        let cfg = OracleConfig { timeout_ms: Some(5), ..Default::default() };
        assert!(check_oracle(&cfg).is_err());
    }
}
