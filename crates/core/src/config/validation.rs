use crate::RelayResult;

/// 配置验证接口
pub trait ConfigValidator {
    fn validate(&self) -> RelayResult<()>;
}
