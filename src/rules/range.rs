//! 区间/列表集合 - schedule 各字段共用的约束原语

/// 把字段值转换成可比较的序号（星期 → 0..6，时刻 → 当日分钟数 ...）
pub trait Ordinal {
    fn ordinal(&self) -> u32;
}

impl Ordinal for u32 {
    fn ordinal(&self) -> u32 {
        *self
    }
}

/// 未设置 / 闭区间 / 显式列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSet<T> {
    /// 未设置，匹配一切
    Any,
    /// `[start, end]`，两端都包含
    Ranged(T, T),
    /// 显式列出的值
    Listed(Vec<T>),
}

impl<T> Default for RangeSet<T> {
    fn default() -> Self {
        RangeSet::Any
    }
}

impl<T: Ordinal> RangeSet<T> {
    pub fn ranged(start: T, end: T) -> Self {
        RangeSet::Ranged(start, end)
    }

    pub fn listed(values: Vec<T>) -> Self {
        RangeSet::Listed(values)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, RangeSet::Any)
    }

    pub fn in_range(&self, value: &T) -> bool {
        let x = value.ordinal();
        match self {
            RangeSet::Any => true,
            RangeSet::Ranged(start, end) => start.ordinal() <= x && x <= end.ordinal(),
            RangeSet::Listed(values) => values.iter().any(|v| v.ordinal() == x),
        }
    }
}
