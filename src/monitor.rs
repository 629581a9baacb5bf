//! Real-time risk monitoring.
//!
//! An observer-style alert stream: the monitor consumes completed
//! [`RiskMetrics`](crate::metrics::RiskMetrics) snapshots, checks them
//! against configured limits, and fans resulting [`RiskAlert`]s out to
//! subscribers. Each subscriber owns a bounded queue; overflow drops the
//! oldest alert (a slow dashboard prefers current state over a complete
//! backlog). The publisher never blocks and subscribers see alerts in
//! publication order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

use crate::metrics::RiskMetrics;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Which monitored metric crossed its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoredMetric {
    Var,
    Cvar,
    MaxDrawdown,
    Sharpe,
    Concentration,
    Leverage,
}

/// A limit crossing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub severity: AlertSeverity,
    pub metric: MonitoredMetric,
    pub threshold: f64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Risk limits for the monitoring feed. Unset limits are not checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_var: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cvar: Option<f64>,
    /// Positive drawdown fraction, e.g. 0.2 for 20%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sharpe: Option<f64>,
    /// Largest single-position weight allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concentration: Option<f64>,
    /// Gross exposure cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leverage: Option<f64>,
}

impl RiskLimits {
    /// Evaluate a metrics snapshot (plus current weights) against the
    /// limits, producing one alert per crossing.
    pub fn check(&self, metrics: &RiskMetrics, weights: &[f64]) -> Vec<RiskAlert> {
        let now = Utc::now();
        let mut alerts = Vec::new();
        let mut push = |metric, threshold: f64, value: f64, critical_ratio: f64| {
            let severity = if critical_ratio >= 1.25 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            alerts.push(RiskAlert {
                severity,
                metric,
                threshold,
                value,
                timestamp: now,
            });
        };

        if let Some(limit) = self.max_var {
            if metrics.var > limit {
                push(MonitoredMetric::Var, limit, metrics.var, metrics.var / limit);
            }
        }
        if let Some(limit) = self.max_cvar {
            if metrics.cvar > limit {
                push(
                    MonitoredMetric::Cvar,
                    limit,
                    metrics.cvar,
                    metrics.cvar / limit,
                );
            }
        }
        if let Some(limit) = self.max_drawdown {
            let drawdown = -metrics.max_drawdown;
            if drawdown > limit {
                push(
                    MonitoredMetric::MaxDrawdown,
                    limit,
                    drawdown,
                    drawdown / limit,
                );
            }
        }
        if let Some(limit) = self.min_sharpe {
            if metrics.sharpe < limit {
                // Distance below the floor scales severity.
                let ratio = if limit.abs() > f64::EPSILON {
                    (limit - metrics.sharpe) / limit.abs() + 1.0
                } else {
                    1.0
                };
                push(MonitoredMetric::Sharpe, limit, metrics.sharpe, ratio);
            }
        }
        if let Some(limit) = self.max_concentration {
            let largest = weights.iter().fold(0.0_f64, |acc, w| acc.max(w.abs()));
            if largest > limit {
                push(
                    MonitoredMetric::Concentration,
                    limit,
                    largest,
                    largest / limit,
                );
            }
        }
        if let Some(limit) = self.max_leverage {
            let gross: f64 = weights.iter().map(|w| w.abs()).sum();
            if gross > limit {
                push(MonitoredMetric::Leverage, limit, gross, gross / limit);
            }
        }

        alerts
    }
}

struct SubscriberQueue {
    alerts: Mutex<VecDeque<RiskAlert>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicUsize,
}

/// A handle to an alert stream. Dropping it unsubscribes.
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// Pop the next alert without blocking.
    pub fn try_recv(&self) -> Option<RiskAlert> {
        self.queue.alerts.lock().unwrap().pop_front()
    }

    /// Wait up to `timeout` for the next alert.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RiskAlert> {
        let mut alerts = self.queue.alerts.lock().unwrap();
        if alerts.is_empty() {
            let (guard, _) = self
                .queue
                .available
                .wait_timeout(alerts, timeout)
                .unwrap();
            alerts = guard;
        }
        alerts.pop_front()
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<RiskAlert> {
        self.queue.alerts.lock().unwrap().drain(..).collect()
    }

    /// Number of alerts dropped on this subscriber due to overflow.
    pub fn dropped(&self) -> usize {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

/// Publishes risk alerts to any number of bounded subscribers.
pub struct RiskMonitor {
    limits: RiskLimits,
    subscribers: Mutex<Vec<Weak<SubscriberQueue>>>,
    queue_capacity: usize,
}

impl RiskMonitor {
    pub fn new(limits: RiskLimits) -> Self {
        Self::with_queue_capacity(limits, 256)
    }

    pub fn with_queue_capacity(limits: RiskLimits, queue_capacity: usize) -> Self {
        Self {
            limits,
            subscribers: Mutex::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Register a new subscriber. Existing subscribers are unaffected.
    pub fn subscribe(&self) -> Subscription {
        let queue = Arc::new(SubscriberQueue {
            alerts: Mutex::new(VecDeque::with_capacity(self.queue_capacity)),
            available: Condvar::new(),
            capacity: self.queue_capacity,
            dropped: AtomicUsize::new(0),
        });
        self.subscribers
            .lock()
            .unwrap()
            .push(Arc::downgrade(&queue));
        Subscription { queue }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Check a metrics snapshot against the limits and publish any
    /// crossings. Returns the alerts generated.
    pub fn observe(&self, metrics: &RiskMetrics, weights: &[f64]) -> Vec<RiskAlert> {
        let alerts = self.limits.check(metrics, weights);
        for alert in &alerts {
            self.publish(alert.clone());
        }
        alerts
    }

    /// Fan an alert out to every live subscriber, dropping the oldest
    /// queued alert on overflow. Dead subscribers are pruned in passing.
    pub fn publish(&self, alert: RiskAlert) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|weak| {
            let Some(queue) = weak.upgrade() else {
                return false;
            };
            let mut alerts = queue.alerts.lock().unwrap();
            if alerts.len() >= queue.capacity {
                alerts.pop_front();
                queue.dropped.fetch_add(1, Ordering::Relaxed);
            }
            alerts.push_back(alert.clone());
            queue.available.notify_one();
            true
        });
        debug!(subscribers = subscribers.len(), "alert published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::VarMethod;

    fn snapshot(var: f64, cvar: f64, sharpe: f64, max_drawdown: f64) -> RiskMetrics {
        RiskMetrics {
            var,
            cvar,
            sharpe,
            sortino: sharpe,
            max_drawdown,
            beta: None,
            volatility: 0.2,
            confidence: 0.95,
            lookback: 252,
            periods_per_year: 252.0,
            var_method: VarMethod::Historical,
        }
    }

    #[test]
    fn test_no_alerts_within_limits() {
        let limits = RiskLimits {
            max_var: Some(0.05),
            max_cvar: Some(0.08),
            min_sharpe: Some(0.5),
            ..Default::default()
        };
        let alerts = limits.check(&snapshot(0.02, 0.03, 1.5, -0.05), &[0.5, 0.5]);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_var_crossing_emits_alert() {
        let limits = RiskLimits {
            max_var: Some(0.05),
            ..Default::default()
        };
        let alerts = limits.check(&snapshot(0.09, 0.10, 1.0, -0.05), &[1.0]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, MonitoredMetric::Var);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert!((alerts[0].threshold - 0.05).abs() < 1e-12);
        assert!((alerts[0].value - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_concentration_and_leverage_checks() {
        let limits = RiskLimits {
            max_concentration: Some(0.3),
            max_leverage: Some(1.5),
            ..Default::default()
        };
        // One 80% position and 1.6 gross exposure.
        let alerts = limits.check(&snapshot(0.01, 0.02, 1.0, 0.0), &[0.8, -0.8]);
        let metrics: Vec<MonitoredMetric> = alerts.iter().map(|a| a.metric).collect();
        assert!(metrics.contains(&MonitoredMetric::Concentration));
        assert!(metrics.contains(&MonitoredMetric::Leverage));
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let monitor = RiskMonitor::new(RiskLimits::default());
        let subscription = monitor.subscribe();

        for i in 0..5 {
            monitor.publish(RiskAlert {
                severity: AlertSeverity::Info,
                metric: MonitoredMetric::Var,
                threshold: 0.05,
                value: 0.05 + i as f64 * 0.01,
                timestamp: Utc::now(),
            });
        }

        let received = subscription.drain();
        assert_eq!(received.len(), 5);
        for (i, alert) in received.iter().enumerate() {
            assert!((alert.value - (0.05 + i as f64 * 0.01)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let monitor = RiskMonitor::with_queue_capacity(RiskLimits::default(), 3);
        let subscription = monitor.subscribe();

        for i in 0..5 {
            monitor.publish(RiskAlert {
                severity: AlertSeverity::Info,
                metric: MonitoredMetric::Cvar,
                threshold: 0.0,
                value: i as f64,
                timestamp: Utc::now(),
            });
        }

        let received = subscription.drain();
        assert_eq!(received.len(), 3);
        // The two oldest (0, 1) were dropped.
        assert!((received[0].value - 2.0).abs() < 1e-12);
        assert_eq!(subscription.dropped(), 2);
    }

    #[test]
    fn test_unsubscribe_by_drop() {
        let monitor = RiskMonitor::new(RiskLimits::default());
        let first = monitor.subscribe();
        {
            let _second = monitor.subscribe();
            assert_eq!(monitor.subscriber_count(), 2);
        }

        monitor.publish(RiskAlert {
            severity: AlertSeverity::Warning,
            metric: MonitoredMetric::Sharpe,
            threshold: 1.0,
            value: 0.2,
            timestamp: Utc::now(),
        });
        // Publishing pruned the dropped subscriber.
        assert_eq!(monitor.subscriber_count(), 1);
        assert_eq!(first.drain().len(), 1);
    }

    #[test]
    fn test_observe_publishes_crossings() {
        let limits = RiskLimits {
            min_sharpe: Some(1.0),
            ..Default::default()
        };
        let monitor = RiskMonitor::new(limits);
        let subscription = monitor.subscribe();

        let alerts = monitor.observe(&snapshot(0.01, 0.02, 0.3, -0.02), &[1.0]);
        assert_eq!(alerts.len(), 1);

        let received = subscription.try_recv().unwrap();
        assert_eq!(received.metric, MonitoredMetric::Sharpe);
    }
}
