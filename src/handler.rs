//! Command-dispatch collaborator: load, decide, raise, commit.
//!
//! [`CommandHandler`] runs one full command cycle per call: it loads the
//! aggregate's history from an [`EventStore`], replays it through
//! [`AggregateRoot::load`], validates the command, and hands the raised
//! events to [`EventStore::append`] with the loaded version as the expected
//! version. The aggregate itself never retries; the handler retries only
//! when configured to.

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::aggregate::Aggregate;
use crate::command::CommandContext;
use crate::error::{ExecuteError, StoreError};
use crate::event::encode_domain_event;
use crate::root::{AggregateRoot, ReplayPolicy};
use crate::store::EventStore;

/// Builds the never-created state an instance is replayed onto.
type SeedFn<A> = Arc<dyn Fn() -> A + Send + Sync>;

/// Executes commands against aggregates of type `A` stored in `S`.
///
/// Callers must serialize commands per aggregate instance; commands for
/// different instances can run fully in parallel. If two writers do race
/// on one instance, the loser gets [`ExecuteError::Conflict`].
///
/// `Clone` is cheap when `S` is.
pub struct CommandHandler<A: Aggregate, S: EventStore> {
    store: S,
    seed: SeedFn<A>,
    replay_policy: ReplayPolicy,
    max_retries: u32,
}

impl<A: Aggregate, S: EventStore + Clone> Clone for CommandHandler<A, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            seed: Arc::clone(&self.seed),
            replay_policy: self.replay_policy,
            max_retries: self.max_retries,
        }
    }
}

impl<A: Aggregate, S: EventStore + fmt::Debug> fmt::Debug for CommandHandler<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandler")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .field("store", &self.store)
            .field("replay_policy", &self.replay_policy)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl<A: Aggregate, S: EventStore> CommandHandler<A, S> {
    /// Start configuring a handler.
    ///
    /// # Arguments
    ///
    /// * `store` - The persistence collaborator.
    /// * `seed` - Produces the never-created state each load replays onto.
    pub fn builder(
        store: S,
        seed: impl Fn() -> A + Send + Sync + 'static,
    ) -> CommandHandlerBuilder<A, S> {
        CommandHandlerBuilder {
            store,
            seed: Arc::new(seed),
            replay_policy: ReplayPolicy::default(),
            max_retries: 0,
        }
    }

    /// The underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load an aggregate instance by replaying its full history.
    ///
    /// # Errors
    ///
    /// * [`ExecuteError::Store`] -- the store could not be read.
    /// * [`ExecuteError::Dispatch`] -- the history could not be replayed.
    /// * [`ExecuteError::Store`] with [`StoreError::InconsistentHistory`] --
    ///   the store's reported version disagrees with the replayed history.
    pub async fn load(&self, id: &str) -> Result<AggregateRoot<A>, ExecuteError<A::Error>> {
        let (history, reported) = self.store.load_history(A::AGGREGATE_TYPE, id).await?;
        let root = AggregateRoot::load(id, (self.seed)(), &history, self.replay_policy)?;
        if root.version() != reported {
            return Err(StoreError::InconsistentHistory {
                reported,
                replayed: root.version(),
            }
            .into());
        }
        Ok(root)
    }

    /// Execute one command and commit the resulting event.
    ///
    /// # Returns
    ///
    /// The aggregate version after the command. An accepted no-op returns
    /// the loaded version unchanged.
    ///
    /// # Errors
    ///
    /// * [`ExecuteError::Domain`] -- the aggregate rejected the command;
    ///   nothing was written.
    /// * [`ExecuteError::Conflict`] -- another writer advanced the stream and
    ///   the configured retries are exhausted. Reload and retry.
    /// * [`ExecuteError::Dispatch`], [`ExecuteError::Store`],
    ///   [`ExecuteError::Encode`] -- infrastructure failures.
    pub async fn handle(
        &self,
        id: &str,
        cmd: A::Command,
        ctx: &CommandContext,
    ) -> Result<u64, ExecuteError<A::Error>>
    where
        A::Command: Clone,
    {
        let span = tracing::info_span!("execute", aggregate_type = A::AGGREGATE_TYPE, instance_id = %id);
        async {
            let mut attempt = 0;
            loop {
                match self.handle_once(id, cmd.clone(), ctx).await {
                    Err(ExecuteError::Conflict { expected, actual }) => {
                        tracing::warn!(expected, actual, attempt, "concurrency conflict");
                        if attempt >= self.max_retries {
                            return Err(ExecuteError::Conflict { expected, actual });
                        }
                        attempt += 1;
                    }
                    other => return other,
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_once(
        &self,
        id: &str,
        cmd: A::Command,
        ctx: &CommandContext,
    ) -> Result<u64, ExecuteError<A::Error>> {
        let mut root = self.load(id).await?;
        let expected = root.version();

        if root.execute(cmd).map_err(ExecuteError::Domain)?.is_none() {
            return Ok(expected);
        }

        let records = root
            .take_uncommitted()
            .iter()
            .enumerate()
            .map(|(i, event)| encode_domain_event::<A>(event, ctx, id, expected + i as u64))
            .collect::<Result<Vec<_>, _>>()?;
        let count = records.len();

        let version = self
            .store
            .append(A::AGGREGATE_TYPE, id, expected, records)
            .await?;

        tracing::info!(count, version, "events appended");
        Ok(version)
    }
}

/// Builder for [`CommandHandler`].
pub struct CommandHandlerBuilder<A: Aggregate, S: EventStore> {
    store: S,
    seed: SeedFn<A>,
    replay_policy: ReplayPolicy,
    max_retries: u32,
}

impl<A: Aggregate, S: EventStore> CommandHandlerBuilder<A, S> {
    /// Set how replay treats events with no bound handler.
    ///
    /// Defaults to [`ReplayPolicy::Reject`].
    pub fn replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    /// Set how many times a command is reloaded and re-applied after a
    /// concurrency conflict before the conflict is surfaced.
    ///
    /// Defaults to 0: conflicts go straight back to the caller.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Finish configuration.
    pub fn build(self) -> CommandHandler<A, S> {
        CommandHandler {
            store: self.store,
            seed: self.seed,
            replay_policy: self.replay_policy,
            max_retries: self.max_retries,
        }
    }
}
