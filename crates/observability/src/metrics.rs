//! 摄取指标收集模块
//!
//! 通过 `metrics` facade 记录；未安装 recorder 时所有调用均为空操作。

use metrics::{counter, gauge, histogram};

/// 记录一次完成的摄取周期
pub fn record_cycle(active_sources: usize, elapsed_ms: f64) {
    counter!("sensor_ingest_cycles_total").increment(1);
    histogram!("sensor_ingest_cycle_duration_ms").record(elapsed_ms);
    record_active_sources(active_sources);
}

/// 记录当前作用域内活跃的传感器数量
pub fn record_active_sources(count: usize) {
    gauge!("sensor_ingest_active_sources").set(count as f64);
}

/// 记录写入一行
pub fn record_row_written(table: &str) {
    counter!(
        "sensor_ingest_rows_written_total",
        "table" => table.to_string()
    )
    .increment(1);
}

/// 记录新建表
pub fn record_table_created(table: &str) {
    counter!(
        "sensor_ingest_tables_created_total",
        "table" => table.to_string()
    )
    .increment(1);
}

/// 记录失败 (kind: schema_parse / storage / cycle_task)
pub fn record_failure(kind: &str) {
    counter!(
        "sensor_ingest_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录传感器未返回缓冲列表
pub fn record_source_anomaly(sensor_id: &str) {
    counter!(
        "sensor_ingest_source_anomalies_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [12.0, 8.0, 10.0, 14.0, 6.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 10.0).abs() < 1e-10);
        assert!((stats.min() - 6.0).abs() < 1e-10);
        assert!((stats.max() - 14.0).abs() < 1e-10);
        assert!((stats.variance() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");

        let mut stats = RunningStats::default();
        stats.push(2.0);
        let text = StatsSummary::from(&stats).to_string();
        assert!(text.contains("mean=2.000"));
        assert!(text.contains("(n=1)"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cycle(3, 1.5);
        record_row_written("t1");
        record_table_created("t1");
        record_failure("storage");
        record_source_anomaly("s1");
    }
}
