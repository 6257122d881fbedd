// ==========================================
// 共享设备预约系统 - 封锁时段解析器
// ==========================================
// 职责: 自由文本/结构化条目 ↔ 规范化封锁区间
// 约束:
// - 容错解析只存在于边界层，解析之后只传递类型化区间
// - 端点解析失败或 end <= start 的行静默丢弃（debug 记录）
// - 输出按 (start, end) 精确去重并升序排序
// ==========================================

use crate::domain::policy::BlackoutSlot;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

/// 端点解析的固定回退格式（配置的展示格式优先）
const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

/// 纯日期回退格式（解析为当日 00:00）
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

// ==========================================
// BlackoutParser - 封锁时段解析器
// ==========================================
pub struct BlackoutParser {
    display_format: String,
}

impl BlackoutParser {
    /// 创建新的 BlackoutParser 实例
    ///
    /// # 参数
    /// - display_format: 配置的展示用日期时间格式，端点解析的首选格式
    pub fn new(display_format: &str) -> Self {
        Self {
            display_format: display_format.to_string(),
        }
    }

    /// 解析自由文本，每行一条时段
    ///
    /// 行格式: `<start> -> <end>`，分隔符按顺序尝试 `->`、`to`、`|`、`,`
    pub fn parse_text(&self, text: &str) -> Vec<BlackoutSlot> {
        let mut slots = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((start_raw, end_raw)) = split_line(line) else {
                debug!(line, "封锁时段行缺少分隔符，丢弃");
                continue;
            };

            match (self.parse_endpoint(&start_raw), self.parse_endpoint(&end_raw)) {
                (Some(start), Some(end)) if end > start => {
                    slots.push(BlackoutSlot { start, end });
                }
                (Some(_), Some(_)) => {
                    debug!(line, "封锁时段 end <= start，丢弃");
                }
                _ => {
                    debug!(line, "封锁时段端点解析失败，丢弃");
                }
            }
        }

        normalize(slots)
    }

    /// 解析结构化 (start, end) 条目列表
    pub fn parse_entries(&self, entries: &[(String, String)]) -> Vec<BlackoutSlot> {
        let mut slots = Vec::new();

        for (start_raw, end_raw) in entries {
            match (self.parse_endpoint(start_raw), self.parse_endpoint(end_raw)) {
                (Some(start), Some(end)) if end > start => {
                    slots.push(BlackoutSlot { start, end });
                }
                _ => {
                    debug!(start = %start_raw, end = %end_raw, "封锁时段条目无效，丢弃");
                }
            }
        }

        normalize(slots)
    }

    /// 渲染为展示文本，每行一条，`"<start> -> <end>"`
    ///
    /// 性质: parse_text(render(slots)) == normalize(slots)
    /// （前提: 展示格式能保留分钟精度）
    pub fn render(&self, slots: &[BlackoutSlot]) -> String {
        let normalized = normalize(slots.to_vec());
        normalized
            .iter()
            .map(|slot| {
                format!(
                    "{} -> {}",
                    slot.start.format(&self.display_format),
                    slot.end.format(&self.display_format)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 解析单个端点：展示格式 → 固定回退格式 → 纯日期
    fn parse_endpoint(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, &self.display_format) {
            return Some(ts);
        }

        for fmt in FALLBACK_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(ts);
            }
        }

        for fmt in FALLBACK_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        None
    }
}

/// 按分隔符切分一行（`->`、词边界 `to`、`|`、裸逗号，依序尝试）
fn split_line(line: &str) -> Option<(String, String)> {
    if let Some((a, b)) = line.split_once("->") {
        return Some((a.trim().to_string(), b.trim().to_string()));
    }
    // " to " 要求两侧空白，避免切开 "October" 之类的内容
    if let Some(idx) = line.find(" to ") {
        let (a, b) = line.split_at(idx);
        return Some((a.trim().to_string(), b[4..].trim().to_string()));
    }
    if let Some((a, b)) = line.split_once('|') {
        return Some((a.trim().to_string(), b.trim().to_string()));
    }
    if let Some((a, b)) = line.split_once(',') {
        return Some((a.trim().to_string(), b.trim().to_string()));
    }
    None
}

/// 规范化: 按 (start, end) 精确去重 + 升序排序
pub fn normalize(mut slots: Vec<BlackoutSlot>) -> Vec<BlackoutSlot> {
    slots.sort();
    slots.dedup();
    slots
}
