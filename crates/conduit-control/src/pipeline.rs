// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use conduit_acl::{ControlEvent, ControlEventEmitter, PublishError};
use conduit_config::{ControlConfig, QueueOverflowPolicy};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::error::{ControlError, ControlResult, ControlSinkError};
use crate::sink::sqlite::SqliteControlSink;
use crate::sink::tracing::TracingControlSink;
use crate::sink::ControlSink;

/// Queues control events and delivers them to every sink from a background task.
///
/// Each sink sees events in queue order. A failing sink is logged and does
/// not affect the others.
pub struct ControlPlaneService {
	tx: mpsc::Sender<ControlEvent>,
	overflow_policy: QueueOverflowPolicy,
	worker: JoinHandle<()>,
}

impl ControlPlaneService {
	/// Starts the delivery task. Must be called inside a tokio runtime.
	pub fn new(
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn ControlSink>>,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));

		let worker = tokio::spawn(Self::background_task(rx, sinks));

		Self {
			tx,
			overflow_policy,
			worker,
		}
	}

	/// Builds the service from configuration.
	///
	/// The tracing sink is added when enabled. The SQLite outbox sink is added
	/// when enabled and a pool is given; its table is created here.
	pub async fn from_config(
		config: &ControlConfig,
		pool: Option<sqlx::SqlitePool>,
	) -> ControlResult<Self> {
		let mut sinks: Vec<Arc<dyn ControlSink>> = Vec::new();

		if config.tracing_sink {
			sinks.push(Arc::new(TracingControlSink::new()));
		}

		if config.sqlite_sink {
			match pool {
				Some(pool) => {
					let sink = SqliteControlSink::new(pool);
					sink
						.ensure_table()
						.await
						.map_err(|source| ControlError::SinkError {
							sink: "sqlite".to_string(),
							source,
						})?;
					sinks.push(Arc::new(sink));
				}
				None => warn!("sqlite control sink enabled without a database pool, skipping"),
			}
		}

		tracing::info!(
			sinks = sinks.len(),
			queue_capacity = config.queue_capacity,
			overflow_policy = ?config.overflow_policy,
			"control plane service started"
		);
		Ok(Self::new(config.queue_capacity, config.overflow_policy, sinks))
	}

	async fn background_task(mut rx: mpsc::Receiver<ControlEvent>, sinks: Vec<Arc<dyn ControlSink>>) {
		while let Some(event) = rx.recv().await {
			let event = Arc::new(event);

			for sink in &sinks {
				if let Err(e) = sink.publish(Arc::clone(&event)).await {
					let transient = matches!(e, ControlSinkError::Transient(_));
					warn!(
						sink = sink.name(),
						event_id = %event.id,
						resource = %event.resource,
						transient,
						error = %e,
						"control sink publish failed"
					);
				}
			}
		}
		tracing::debug!("control event queue closed");
	}

	/// Queue an event for delivery.
	///
	/// Under `DropNewest` a full queue rejects the event with
	/// [`ControlError::QueueFull`]; under `Block` the caller waits for room.
	#[instrument(skip(self, event), fields(event_id = %event.id, resource = %event.resource, kind = %event.kind))]
	pub async fn submit(&self, event: ControlEvent) -> ControlResult<()> {
		match self.overflow_policy {
			QueueOverflowPolicy::Block => self
				.tx
				.send(event)
				.await
				.map_err(|_| ControlError::Shutdown),
			QueueOverflowPolicy::DropNewest => match self.tx.try_send(event) {
				Ok(()) => Ok(()),
				Err(TrySendError::Full(event)) => {
					warn!(event_id = %event.id, "control event queue full, dropping event");
					Err(ControlError::QueueFull)
				}
				Err(TrySendError::Closed(_)) => Err(ControlError::Shutdown),
			},
		}
	}

	/// Stops accepting events and waits until every queued event reached the sinks.
	pub async fn shutdown(self) {
		let Self { tx, worker, .. } = self;
		drop(tx);
		if let Err(e) = worker.await {
			warn!(error = %e, "control delivery task ended abnormally");
		}
	}
}

#[async_trait]
impl ControlEventEmitter for ControlPlaneService {
	async fn publish(&self, event: ControlEvent) -> Result<(), PublishError> {
		Ok(self.submit(event).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use conduit_acl::{ControlEventKind, GrantId, SetId};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::sync::{Mutex, Semaphore};

	struct TestSink {
		name: String,
		seen: Mutex<Vec<ControlEvent>>,
	}

	impl TestSink {
		fn new(name: &str) -> Self {
			Self {
				name: name.to_string(),
				seen: Mutex::new(Vec::new()),
			}
		}

		async fn seen(&self) -> Vec<ControlEvent> {
			self.seen.lock().await.clone()
		}
	}

	#[async_trait]
	impl ControlSink for TestSink {
		fn name(&self) -> &str {
			&self.name
		}

		async fn publish(&self, event: Arc<ControlEvent>) -> Result<(), ControlSinkError> {
			self.seen.lock().await.push((*event).clone());
			Ok(())
		}
	}

	struct FailingSink {
		attempts: AtomicUsize,
	}

	#[async_trait]
	impl ControlSink for FailingSink {
		fn name(&self) -> &str {
			"failing"
		}

		async fn publish(&self, _event: Arc<ControlEvent>) -> Result<(), ControlSinkError> {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			Err(ControlSinkError::Transient("test error".to_string()))
		}
	}

	/// Holds the delivery task on every event until a permit is added.
	struct GateSink {
		gate: Arc<Semaphore>,
	}

	#[async_trait]
	impl ControlSink for GateSink {
		fn name(&self) -> &str {
			"gate"
		}

		async fn publish(&self, _event: Arc<ControlEvent>) -> Result<(), ControlSinkError> {
			if let Ok(permit) = self.gate.acquire().await {
				permit.forget();
			}
			Ok(())
		}
	}

	fn event(kind: ControlEventKind) -> ControlEvent {
		ControlEvent::new(SetId::generate().into(), kind, GrantId::generate())
	}

	mod delivery {
		use super::*;

		#[tokio::test]
		async fn test_events_reach_sinks_in_order() {
			let sink = Arc::new(TestSink::new("test"));
			let service = ControlPlaneService::new(16, QueueOverflowPolicy::DropNewest, vec![sink.clone()]);

			let activate = event(ControlEventKind::Activate);
			let pause = event(ControlEventKind::Pause);
			service.publish(activate.clone()).await.unwrap();
			service.publish(pause.clone()).await.unwrap();
			service.shutdown().await;

			let seen = sink.seen().await;
			assert_eq!(seen, vec![activate, pause]);
		}

		#[tokio::test]
		async fn test_fan_out_to_multiple_sinks() {
			let sink1 = Arc::new(TestSink::new("sink1"));
			let sink2 = Arc::new(TestSink::new("sink2"));
			let service = ControlPlaneService::new(
				16,
				QueueOverflowPolicy::DropNewest,
				vec![sink1.clone(), sink2.clone()],
			);

			service.publish(event(ControlEventKind::Activate)).await.unwrap();
			service.shutdown().await;

			assert_eq!(sink1.seen().await.len(), 1);
			assert_eq!(sink2.seen().await.len(), 1);
		}

		#[tokio::test]
		async fn test_failing_sink_does_not_block_others() {
			let failing = Arc::new(FailingSink {
				attempts: AtomicUsize::new(0),
			});
			let good = Arc::new(TestSink::new("good"));
			let service = ControlPlaneService::new(
				16,
				QueueOverflowPolicy::DropNewest,
				vec![failing.clone(), good.clone()],
			);

			service.publish(event(ControlEventKind::Activate)).await.unwrap();
			service.publish(event(ControlEventKind::Pause)).await.unwrap();
			service.shutdown().await;

			assert_eq!(failing.attempts.load(Ordering::SeqCst), 2);
			assert_eq!(good.seen().await.len(), 2);
		}
	}

	mod overflow {
		use super::*;

		#[tokio::test]
		async fn test_drop_newest_reports_queue_full() {
			let gate = Arc::new(Semaphore::new(0));
			let service = ControlPlaneService::new(
				1,
				QueueOverflowPolicy::DropNewest,
				vec![Arc::new(GateSink { gate: gate.clone() })],
			);

			// The first event is taken by the worker and parks in the gate.
			service.publish(event(ControlEventKind::Activate)).await.unwrap();
			tokio::task::yield_now().await;
			let mut results = Vec::new();
			for _ in 0..3 {
				results.push(service.publish(event(ControlEventKind::Pause)).await);
			}

			assert!(results
				.iter()
				.any(|r| matches!(r, Err(PublishError::QueueFull))));

			gate.add_permits(4);
			service.shutdown().await;
		}

		#[tokio::test]
		async fn test_block_waits_for_room() {
			let sink = Arc::new(TestSink::new("test"));
			let service = ControlPlaneService::new(1, QueueOverflowPolicy::Block, vec![sink.clone()]);

			for _ in 0..8 {
				service.publish(event(ControlEventKind::Activate)).await.unwrap();
			}
			service.shutdown().await;

			assert_eq!(sink.seen().await.len(), 8);
		}
	}

	#[tokio::test]
	async fn test_from_config_without_pool_skips_sqlite() {
		let config = ControlConfig {
			sqlite_sink: true,
			tracing_sink: false,
			..Default::default()
		};
		let service = ControlPlaneService::from_config(&config, None).await.unwrap();
		service.publish(event(ControlEventKind::Activate)).await.unwrap();
		service.shutdown().await;
	}
}
