use crate::error::NodeError;
use pokerchain_core::TableLimits;
use serde::{Deserialize, Serialize};

/// 节点配置，所有字段都有默认值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// 创建牌桌时校验配置用的上下限
    pub limits: TableLimits,
}

impl NodeConfig {
    pub fn from_json(s: &str) -> Result<Self, NodeError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = NodeConfig::from_json("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.limits.max_players, 9);

        let config = NodeConfig::from_json(r#"{"limits":{"max_players":6}}"#).unwrap();
        assert_eq!(config.limits.max_players, 6);
        assert_eq!(config.limits.max_timeout_secs, 3600);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(NodeConfig::from_json("{"), Err(NodeError::Config(_))));
    }
}
