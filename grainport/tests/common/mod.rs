//! Test actors and helpers shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;

use grainport::prelude::*;

thread_local! {
    static JOURNAL: RefCell<Vec<(String, String)>> = const { RefCell::new(Vec::new()) };
}

/// Record `event` for actor `id`.
pub fn record(id: &str, event: impl Into<String>) {
    JOURNAL.with(|journal| journal.borrow_mut().push((id.to_string(), event.into())));
}

/// Events recorded for actor `id`, in order.
pub fn events(id: &str) -> Vec<String> {
    JOURNAL.with(|journal| {
        journal
            .borrow()
            .iter()
            .filter(|(owner, _)| owner == id)
            .map(|(_, event)| event.clone())
            .collect()
    })
}

pub fn clear_journal() {
    JOURNAL.with(|journal| journal.borrow_mut().clear());
}

/// Run `f` on a paused current-thread runtime inside a `LocalSet`.
pub fn run_local_test<F: Future<Output = ()> + 'static>(f: F) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    clear_journal();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("build runtime");
    tokio::task::LocalSet::new().block_on(&rt, f);
}

pub fn library() -> ActorLibrary {
    ActorLibrary::new("grainport-tests")
        .actor::<Recorder>()
        .actor::<Sticky>()
        .actor::<Broken>()
}

pub async fn system(config: SystemConfig) -> ActorSystem {
    ActorSystem::builder()
        .config(config)
        .library(library())
        .done()
        .await
        .expect("build system")
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Echo {
        value: Value,
    },
    Slow {
        label: String,
        ms: u64,
        #[serde(default)]
        reentrant: bool,
    },
    Remind {
        name: String,
        period_ms: u64,
    },
    Forget {
        name: String,
    },
    Retire,
    Call {
        target: String,
    },
}

/// Records its lifecycle; registered as `Foo.A`.
///
/// Instances whose id starts with `ephemeral` ask to be deactivated on idle
/// while activating.
pub struct Recorder;

#[async_trait(?Send)]
impl Actor for Recorder {
    fn type_code() -> ActorTypeCode {
        ActorTypeCode::from("Foo.A")
    }

    fn is_reentrant(message: &Value) -> bool {
        message
            .get("reentrant")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn activate(_id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
        Ok(Recorder)
    }

    async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError> {
        let id = ctx.id();
        match message {
            Message::Activate => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                record(id, "activate");
                if id.starts_with("ephemeral") {
                    ctx.lifecycle().deactivate_on_idle()?;
                }
                Ok(Value::Null)
            }
            Message::Deactivate => {
                record(id, "deactivate");
                Ok(Value::Null)
            }
            Message::Reminder(reminder) => {
                record(id, format!("reminder {}", reminder.name()));
                Ok(Value::Null)
            }
            Message::Application(value) => match serde_json::from_value(value)? {
                Command::Echo { value } => {
                    record(id, format!("echo {}", value));
                    Ok(value)
                }
                Command::Slow { label, ms, .. } => {
                    record(id, format!("start {}", label));
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    record(id, format!("end {}", label));
                    Ok(Value::Null)
                }
                Command::Remind { name, period_ms } => {
                    let period = Duration::from_millis(period_ms);
                    ctx.lifecycle()
                        .register_or_update_reminder(&name, period, period)
                        .await?;
                    Ok(Value::Null)
                }
                Command::Forget { name } => {
                    if let Some(reminder) = ctx.lifecycle().get_reminder(&name).await? {
                        ctx.lifecycle().unregister_reminder(&reminder).await?;
                    }
                    Ok(Value::Null)
                }
                Command::Retire => {
                    ctx.lifecycle().deactivate_on_idle()?;
                    Ok(Value::Null)
                }
                Command::Call { target } => {
                    let reply: Value = ctx
                        .actor_of::<Sticky>(target)?
                        .ask(&json!({ "op": "whoami" }))
                        .await?;
                    Ok(reply)
                }
            },
        }
    }
}

/// Keeps itself alive for a minute after every message; registered as
/// `Foo.Bar.B`.
pub struct Sticky;

#[async_trait(?Send)]
impl Actor for Sticky {
    fn type_code() -> ActorTypeCode {
        ActorTypeCode::from("Foo.Bar.B")
    }

    fn keep_alive() -> KeepAlive {
        KeepAlive::Extend(Duration::from_secs(60))
    }

    fn activate(_id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
        Ok(Sticky)
    }

    async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError> {
        match message {
            Message::Activate => {
                record(ctx.id(), "activate");
                Ok(Value::Null)
            }
            Message::Deactivate => {
                record(ctx.id(), "deactivate");
                Ok(Value::Null)
            }
            _ => Ok(Value::from(ctx.id())),
        }
    }
}

/// Never gets past construction.
pub struct Broken;

#[async_trait(?Send)]
impl Actor for Broken {
    fn activate(id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
        record(id, "construct");
        Err(ActorError::Failed("broken on purpose".into()))
    }

    async fn receive(&self, _ctx: &ActorContext, _message: Message) -> Result<Value, ActorError> {
        Ok(Value::Null)
    }
}

/// Claims the same code as [`Recorder`].
pub struct Twin;

#[async_trait(?Send)]
impl Actor for Twin {
    fn type_code() -> ActorTypeCode {
        ActorTypeCode::from("Foo.A")
    }

    fn activate(_id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
        Ok(Twin)
    }

    async fn receive(&self, _ctx: &ActorContext, _message: Message) -> Result<Value, ActorError> {
        Ok(Value::Null)
    }
}
