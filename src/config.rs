//! 语义分析配置

/// 通过对象访问字段（`base.field`）时的可见性规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldAccessRule {
    /// 访问点必须位于某个类 `C` 内部，且 `base` 的类是 `C` 本身或其子类
    #[default]
    Protected,
    /// 访问点只需位于任意类内部
    AnyClassScope,
    /// 不做可见性检查
    Public,
}

/// 分析器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaConfig {
    pub field_access: FieldAccessRule,
    /// 子类重定义继承方法时检查签名是否一致
    pub check_overrides: bool,
    /// 最多保存的诊断条数；`None` 表示不限
    pub error_limit: Option<usize>,
}

impl Default for SemaConfig {
    fn default() -> Self {
        Self {
            field_access: FieldAccessRule::default(),
            check_overrides: true,
            error_limit: None,
        }
    }
}

impl SemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_access(mut self, rule: FieldAccessRule) -> Self {
        self.field_access = rule;
        self
    }

    pub fn with_override_checks(mut self, enabled: bool) -> Self {
        self.check_overrides = enabled;
        self
    }

    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = Some(limit);
        self
    }
}
