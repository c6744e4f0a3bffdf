//! 時間點選取器
//!
//! 依影片長度與前後略過比例，在可用區間內均勻分布取樣點。

use crate::config::{GridRule, validate_skip_percentages};
use crate::error::{MontageError, MontageResult};

/// 可用區間 `[start, end]`（秒）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    pub start: f64,
    pub end: f64,
}

impl SampleWindow {
    pub fn new(duration: f64, skip_start_pct: f64, skip_end_pct: f64) -> MontageResult<Self> {
        validate_skip_percentages(skip_start_pct, skip_end_pct)?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(MontageError::Input(format!("無效的影片長度: {duration}")));
        }

        Ok(Self {
            start: duration * skip_start_pct / 100.0,
            end: duration * (1.0 - skip_end_pct / 100.0),
        })
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn midpoint(&self) -> f64 {
        f64::midpoint(self.start, self.end)
    }

    /// 在區間內均勻分布 `count` 個時間點
    pub fn spread(&self, count: usize) -> MontageResult<Vec<f64>> {
        if count == 0 {
            return Err(MontageError::Config("取樣數量必須 >= 1".to_string()));
        }
        Ok(spread_in_window(*self, count))
    }
}

/// 選取均勻分布的時間點
///
/// `count > 1` 時包含區間兩端，`count == 1` 時取區間中點
pub fn select_timestamps(
    duration: f64,
    skip_start_pct: f64,
    skip_end_pct: f64,
    count: usize,
) -> MontageResult<Vec<f64>> {
    if count == 0 {
        return Err(MontageError::Config("取樣數量必須 >= 1".to_string()));
    }

    SampleWindow::new(duration, skip_start_pct, skip_end_pct)?.spread(count)
}

fn spread_in_window(window: SampleWindow, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![window.midpoint()];
    }

    let step = window.length() / (count - 1) as f64;
    (0..count)
        .map(|i| {
            // 最後一點直接使用區間終點，避免浮點誤差超出範圍
            if i == count - 1 {
                window.end
            } else {
                (window.start + step * i as f64).min(window.end)
            }
        })
        .collect()
}

/// 將時間點對齊到可解碼的影格時間
///
/// 區間內的影格數少於取樣數時，相鄰時間點會落在同一張影格上，
/// 此時直接重複使用最近的有效時間點，數量不變。
///
/// 影片最後一張影格的時間是 `ceil(duration * fps) - 1` 格，
/// 等於 `duration` 的時間點沒有影格可解碼，因此上限取兩者較小者。
pub fn snap_to_frames(
    timestamps: &mut [f64],
    frame_rate: f64,
    window: SampleWindow,
    duration: f64,
) {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return;
    }

    let last_decodable = ((duration * frame_rate).ceil() - 1.0).max(0.0) / frame_rate;
    let first_frame = (window.start * frame_rate).ceil() / frame_rate;
    let last_frame = ((window.end * frame_rate).floor() / frame_rate).min(last_decodable);

    for t in timestamps.iter_mut() {
        let snapped = (*t * frame_rate).round() / frame_rate;
        *t = if first_frame > last_frame {
            // 區間比一張影格還短
            window.start.min(last_decodable)
        } else {
            snapped.clamp(first_frame, last_frame)
        };
    }
}

/// 依影片長度從規則表選出網格大小
///
/// 有上限的規則依 `max_duration` 由小到大比對，第一個符合者勝出；
/// 都不符合時使用 `max_duration` 為負數的預設規則。
#[must_use]
pub fn grid_for_duration(rules: &[GridRule], duration: f64) -> Option<(u32, u32)> {
    let mut limited: Vec<&GridRule> = rules.iter().filter(|r| r.max_duration > 0.0).collect();
    limited.sort_by(|a, b| a.max_duration.total_cmp(&b.max_duration));

    limited
        .into_iter()
        .find(|rule| duration <= rule.max_duration)
        .or_else(|| rules.iter().find(|r| r.max_duration < 0.0))
        .map(|rule| (rule.columns, rule.rows))
}
