//! # 站点状态滞回
//!
//! 下线需要连续 N 次失败，恢复只需一次成功。计数只保存在进程内，
//! 重启后从存储中的已提交状态重新开始。

use dashmap::DashMap;

use super::types::StatusVerdict;

/// 每个站点自上次在线以来的连续失败次数
#[derive(Debug)]
pub struct FailureCounter {
    counts: DashMap<i32, u32>,
    down_threshold: u32,
}

impl FailureCounter {
    #[must_use]
    pub fn new(down_threshold: u32) -> Self {
        Self {
            counts: DashMap::new(),
            down_threshold: down_threshold.max(1),
        }
    }

    #[must_use]
    pub const fn down_threshold(&self) -> u32 {
        self.down_threshold
    }

    /// 当前连续失败次数
    #[must_use]
    pub fn failures(&self, site_id: i32) -> u32 {
        self.counts.get(&site_id).map_or(0, |count| *count)
    }

    /// 根据一次探测结果决定是否提交状态
    ///
    /// `was_up` 为调度时已提交的状态。
    pub fn evaluate(&self, site_id: i32, was_up: bool, is_up: bool) -> StatusVerdict {
        if is_up {
            self.counts.remove(&site_id);
            return if was_up {
                StatusVerdict::RefreshLatency
            } else {
                StatusVerdict::Commit { is_up: true }
            };
        }

        if !was_up {
            return StatusVerdict::RefreshLatency;
        }

        let mut count = self.counts.entry(site_id).or_insert(0);
        *count += 1;
        if *count >= self.down_threshold {
            drop(count);
            self.counts.remove(&site_id);
            StatusVerdict::Commit { is_up: false }
        } else {
            StatusVerdict::RefreshLatency
        }
    }

    /// 下线提交写入失败后恢复计数，下一次失败会再次尝试提交
    pub fn restore_after_failed_commit(&self, site_id: i32) {
        self.counts.insert(site_id, self.down_threshold - 1);
    }
}
