//! 字段路径解析与求值
//!
//! 字段路径由三种段组成：对象键、数组下标和通配符。通配符展开使用定长栈的显式迭代器
//! 实现笛卡尔积，不做递归，内存和时间上界由 [`MAX_WILDCARD_DEPTH`] 决定。

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// 解析器支持的通配符层数上限（校验器的硬限制不能超过这个值）
pub const MAX_WILDCARD_DEPTH: usize = 4;

/// 路径段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

/// 路径解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("路径为空")]
    Empty,

    #[error("第 {0} 段的键为空")]
    EmptyKey(usize),

    #[error("方括号未闭合: '{0}'")]
    UnclosedBracket(String),

    #[error("无效的数组下标: '{0}'")]
    InvalidIndex(String),

    #[error("无效的路径段: {0}")]
    InvalidSegment(String),
}

/// 规则定义中的原始路径（点号字符串或段数组），编译时转换为 [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFieldPath {
    Dotted(String),
    Segments(Vec<Value>),
}

impl From<&str> for RawFieldPath {
    fn from(s: &str) -> Self {
        Self::Dotted(s.to_string())
    }
}

/// 已解析的字段路径，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Box<[PathSegment]>,
}

impl FieldPath {
    /// 从段列表创建路径
    pub fn from_segments(segments: Vec<PathSegment>) -> Result<Self, PathParseError> {
        if segments.is_empty() {
            return Err(PathParseError::Empty);
        }
        for (i, seg) in segments.iter().enumerate() {
            if matches!(seg, PathSegment::Key(k) if k.is_empty()) {
                return Err(PathParseError::EmptyKey(i));
            }
        }
        Ok(Self {
            segments: segments.into_boxed_slice(),
        })
    }

    /// 解析点号路径，如 `facilities[*].sensors[0].status` 或 `tags.*`
    pub fn parse(path: &str) -> Result<Self, PathParseError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathParseError::Empty);
        }

        let mut segments = Vec::new();
        for (i, part) in path.split('.').enumerate() {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            match name {
                "" if rest.is_empty() => return Err(PathParseError::EmptyKey(i)),
                "" => {}
                "*" => segments.push(PathSegment::Wildcard),
                _ if name.contains(']') => {
                    return Err(PathParseError::InvalidSegment(part.to_string()));
                }
                _ => segments.push(PathSegment::key(name)),
            }

            while !rest.is_empty() {
                if !rest.starts_with('[') {
                    return Err(PathParseError::InvalidSegment(part.to_string()));
                }
                let close = rest
                    .find(']')
                    .ok_or_else(|| PathParseError::UnclosedBracket(part.to_string()))?;
                let inner = rest[1..close].trim();
                if inner == "*" {
                    segments.push(PathSegment::Wildcard);
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| PathParseError::InvalidIndex(inner.to_string()))?;
                    segments.push(PathSegment::Index(index));
                }
                rest = &rest[close + 1..];
            }
        }

        Self::from_segments(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 对象键段数量
    pub fn key_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Key(_)))
            .count()
    }

    /// 通配符段数量
    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Wildcard))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PathSegment::Wildcard)
    }

    /// 在记录上求值路径
    ///
    /// 无通配符时最多产生一个值；有通配符时按数组元素展开，嵌套通配符产生笛卡尔积。
    /// 通配符要求当前节点是数组，否则该分支视为缺失。
    pub fn resolve<'p, 'v>(&'p self, record: &'v Value) -> Resolution<'p, 'v> {
        let mut wildcard_at = [0usize; MAX_WILDCARD_DEPTH];
        let mut wildcards = 0;
        for (i, seg) in self.segments.iter().enumerate() {
            if *seg == PathSegment::Wildcard {
                if wildcards == MAX_WILDCARD_DEPTH {
                    // 超出结构上限的路径不展开
                    return Resolution::Missing;
                }
                wildcard_at[wildcards] = i;
                wildcards += 1;
            }
        }

        if wildcards == 0 {
            return match walk(record, &self.segments) {
                Some(value) => Resolution::Value(value),
                None => Resolution::Missing,
            };
        }

        match walk(record, &self.segments[..wildcard_at[0]]) {
            Some(Value::Array(items)) => {
                let mut stack = [Level::EMPTY; MAX_WILDCARD_DEPTH];
                stack[0] = Level { items, next: 0 };
                Resolution::Branches(Branches {
                    segments: &self.segments,
                    wildcard_at,
                    wildcards,
                    stack,
                    depth: 1,
                })
            }
            _ => Resolution::Missing,
        }
    }
}

impl TryFrom<&RawFieldPath> for FieldPath {
    type Error = PathParseError;

    fn try_from(raw: &RawFieldPath) -> Result<Self, Self::Error> {
        match raw {
            RawFieldPath::Dotted(s) => Self::parse(s),
            RawFieldPath::Segments(items) => {
                let segments = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) if s == "*" => Ok(PathSegment::Wildcard),
                        Value::String(s) => Ok(PathSegment::key(s.as_str())),
                        Value::Number(n) => n
                            .as_u64()
                            .and_then(|i| usize::try_from(i).ok())
                            .map(PathSegment::Index)
                            .ok_or_else(|| PathParseError::InvalidIndex(n.to_string())),
                        other => Err(PathParseError::InvalidSegment(other.to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_segments(segments)
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
                PathSegment::Wildcard => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 沿不含通配符的段序列下降
fn walk<'v>(mut current: &'v Value, segments: &[PathSegment]) -> Option<&'v Value> {
    for seg in segments {
        current = match (seg, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// 路径求值结果，同时也是按分支产出值的迭代器
pub enum Resolution<'p, 'v> {
    /// 路径不存在
    Missing,
    /// 无通配符路径的单个值（可能是显式 null）
    Value(&'v Value),
    /// 通配符路径的展开分支
    Branches(Branches<'p, 'v>),
}

impl<'p, 'v> Iterator for Resolution<'p, 'v> {
    type Item = &'v Value;

    fn next(&mut self) -> Option<&'v Value> {
        match self {
            Self::Missing => None,
            Self::Value(value) => {
                let value = *value;
                *self = Self::Missing;
                Some(value)
            }
            Self::Branches(branches) => branches.next(),
        }
    }
}

#[derive(Clone, Copy)]
struct Level<'v> {
    items: &'v [Value],
    next: usize,
}

impl Level<'_> {
    const EMPTY: Level<'static> = Level {
        items: &[],
        next: 0,
    };
}

/// 通配符展开迭代器
///
/// 每一层通配符占用栈中一个 [`Level`]，深度不超过 [`MAX_WILDCARD_DEPTH`]。
pub struct Branches<'p, 'v> {
    segments: &'p [PathSegment],
    wildcard_at: [usize; MAX_WILDCARD_DEPTH],
    wildcards: usize,
    stack: [Level<'v>; MAX_WILDCARD_DEPTH],
    depth: usize,
}

impl<'v> Iterator for Branches<'_, 'v> {
    type Item = &'v Value;

    fn next(&mut self) -> Option<&'v Value> {
        while self.depth > 0 {
            let lvl = self.depth - 1;
            let Level { items, next } = self.stack[lvl];
            let Some(item) = items.get(next) else {
                self.depth -= 1;
                continue;
            };
            self.stack[lvl].next += 1;

            let start = self.wildcard_at[lvl] + 1;
            let end = if lvl + 1 < self.wildcards {
                self.wildcard_at[lvl + 1]
            } else {
                self.segments.len()
            };

            let Some(value) = walk(item, &self.segments[start..end]) else {
                continue;
            };

            if lvl + 1 < self.wildcards {
                if let Value::Array(children) = value {
                    self.stack[lvl + 1] = Level {
                        items: children,
                        next: 0,
                    };
                    self.depth += 1;
                }
                continue;
            }

            return Some(value);
        }
        None
    }
}
