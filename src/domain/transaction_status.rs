//! 预备交易状态机
//!
//! pending → broadcasting → confirming | failed
//! broadcasting → pending（可重试错误耗尽重试次数后回退）

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 已准备，等待签名与广播
    Pending,

    /// 已被某个广播请求占用
    Broadcasting,

    /// 节点已接受，等待上链确认
    Confirming,

    /// 永久失败
    Failed,
}

impl TransactionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "交易待广播",
            Self::Broadcasting => "交易广播中",
            Self::Confirming => "交易确认中",
            Self::Failed => "交易失败",
        }
    }

    /// 是否为最终状态（对本引擎而言不再变化）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirming | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        matches!(
            (self, target),
            (Pending, Broadcasting)
                | (Broadcasting, Confirming)
                | (Broadcasting, Failed)
                | (Broadcasting, Pending)
        )
    }

    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "broadcasting" => Some(Self::Broadcasting),
            "confirming" => Some(Self::Confirming),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Broadcasting => "broadcasting",
            Self::Confirming => "confirming",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
