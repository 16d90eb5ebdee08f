//! # Draw Orchestrator
//!
//! ## The Draw Pipeline
//!
//! ```text
//! credential + { gacha_id, times } -> DrawEngine::draw() ->
//!   1. Verify credential          -> user id
//!   2. Gacha exists?              (no side effects)
//!   3. times >= 1, buffer fits?   (no side effects)
//!   4. Balance >= times?          (no side effects)
//!   5. Debit times                POINT OF NO RETURN
//!   6. Fetch catalog
//!   7. Draw times entries         (ChaCha20, one generator per request)
//!   8. Persist ownership records  (batches of `batch_size`)
//!   9. Return (character id, name) in draw order
//! ```
//!
//! Steps 1-5 reject without side effects. Once the debit succeeds every
//! remaining failure is reported as [`DrawError::GrantIncomplete`]: currency
//! has been taken and the inventory does not match, so it must be reconciled.
//!
//! One unit of currency buys one draw.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{Authenticator, UserId};
use crate::batch::{OwnershipBatcher, DEFAULT_BATCH_SIZE};
use crate::catalog::{CatalogEntry, CatalogProvider, EntryId, GachaId};
use crate::entropy::{EntropySource, OsEntropy};
use crate::error::{DrawError, EconomyResult, LedgerError, LedgerStep};
use crate::ledger::Ledger;
use crate::ownership::{OwnershipRecord, OwnershipStore};
use crate::selector::WeightedSelector;

/// Orchestrator tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawConfig {
    /// Ownership records per `insert_batch` call.
    pub batch_size: usize,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Draw parameters as received from the caller.
///
/// `times` is signed so that non-positive counts reach validation instead of
/// failing to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawParams {
    /// Gacha to draw from.
    pub gacha_id: GachaId,
    /// Number of draws.
    pub times: i64,
}

/// A validated draw request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawRequest {
    /// Gacha to draw from.
    pub gacha_id: GachaId,
    /// Number of draws, at least one.
    pub times: u64,
    /// Paying user.
    pub user_id: UserId,
}

/// One drawn character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawnCharacter {
    /// Catalog entry id.
    pub character_id: EntryId,
    /// Display name.
    pub name: String,
}

/// Outcome of a successful draw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawResult {
    /// Drawn characters in draw order, exactly `times` long.
    pub results: Vec<DrawnCharacter>,
}

/// Per-user mutual exclusion for ledgers without an atomic debit.
///
/// Holding a lease for a user blocks other leases for the same user until it
/// is dropped. Process-local only.
#[derive(Debug, Default)]
pub struct UserLeases {
    held: Mutex<HashSet<UserId>>,
    released: Condvar,
}

/// A held lease. Released on drop.
#[derive(Debug)]
pub struct UserLease<'a> {
    leases: &'a UserLeases,
    user_id: UserId,
}

impl UserLeases {
    /// Creates an empty lease table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until no other lease for `user_id` is held, then takes one.
    pub fn acquire(&self, user_id: &str) -> UserLease<'_> {
        let mut held = self.held.lock();
        while held.contains(user_id) {
            self.released.wait(&mut held);
        }
        held.insert(user_id.to_owned());
        UserLease {
            leases: self,
            user_id: user_id.to_owned(),
        }
    }

    /// Whether a lease for `user_id` is currently held.
    #[must_use]
    pub fn is_held(&self, user_id: &str) -> bool {
        self.held.lock().contains(user_id)
    }
}

impl Drop for UserLease<'_> {
    fn drop(&mut self) {
        self.leases.held.lock().remove(&self.user_id);
        self.leases.released.notify_all();
    }
}

/// The draw engine.
///
/// Holds no per-request state; one instance serves all requests concurrently.
pub struct DrawEngine {
    pub(crate) auth: Arc<dyn Authenticator>,
    pub(crate) catalog: Arc<dyn CatalogProvider>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) store: Arc<dyn OwnershipStore>,
    entropy: Arc<dyn EntropySource>,
    leases: UserLeases,
    config: DrawConfig,
}

impl DrawEngine {
    /// Creates an engine with OS entropy and the default batch size.
    #[must_use]
    pub fn new(
        auth: Arc<dyn Authenticator>,
        catalog: Arc<dyn CatalogProvider>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn OwnershipStore>,
    ) -> Self {
        Self {
            auth,
            catalog,
            ledger,
            store,
            entropy: Arc::new(OsEntropy),
            leases: UserLeases::new(),
            config: DrawConfig::default(),
        }
    }

    /// Replaces the randomness source.
    #[must_use]
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Replaces the tuning.
    #[must_use]
    pub fn with_config(mut self, config: DrawConfig) -> Self {
        self.config = config;
        self
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &DrawConfig {
        &self.config
    }

    /// Resolves a credential to a user id.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::Unauthenticated`].
    pub fn authenticate(&self, credential: Option<&str>) -> EconomyResult<UserId> {
        self.auth.verify(credential).map_err(|e| {
            tracing::warn!("Rejected credential: {}", e);
            DrawError::from(e)
        })
    }

    /// Runs a draw for the holder of `credential`.
    ///
    /// # Errors
    ///
    /// See [`DrawError`]. Only [`DrawError::GrantIncomplete`] can follow a
    /// successful debit.
    pub fn draw(&self, params: DrawParams, credential: Option<&str>) -> EconomyResult<DrawResult> {
        let user_id = self.authenticate(credential)?;
        self.draw_for_user(&user_id, params)
    }

    /// Runs a draw for an already authenticated user.
    ///
    /// # Errors
    ///
    /// See [`DrawEngine::draw`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn draw_for_user(&self, user_id: &str, params: DrawParams) -> EconomyResult<DrawResult> {
        let request = self.validate(user_id, params)?;
        let results = reserve_results(&request)?;
        self.spend(&request)?;

        match self.grant(&request, results) {
            Ok(result) => {
                tracing::info!(
                    "User {} drew {} from gacha {}",
                    request.user_id,
                    request.times,
                    request.gacha_id
                );
                Ok(result)
            }
            Err(incomplete) => {
                tracing::error!("{}", incomplete);
                Err(incomplete)
            }
        }
    }

    /// Steps 2 and 3.
    fn validate(&self, user_id: &str, params: DrawParams) -> EconomyResult<DrawRequest> {
        if !self.catalog.exists(params.gacha_id)? {
            tracing::warn!("Unknown gacha {}", params.gacha_id);
            return Err(DrawError::InvalidCatalog(params.gacha_id));
        }

        let times = u64::try_from(params.times)
            .ok()
            .filter(|&t| t >= 1)
            .ok_or_else(|| {
                DrawError::InvalidArgument(format!("times must be at least 1, got {}", params.times))
            })?;
        if usize::try_from(times).is_err() {
            return Err(DrawError::InvalidArgument(format!(
                "times {times} exceeds the addressable draw count"
            )));
        }

        Ok(DrawRequest {
            gacha_id: params.gacha_id,
            times,
            user_id: user_id.to_owned(),
        })
    }

    /// Steps 4 and 5.
    fn spend(&self, request: &DrawRequest) -> EconomyResult<()> {
        let cost = request.times;
        let _lease = (!self.ledger.atomic_debit()).then(|| self.leases.acquire(&request.user_id));

        let balance = self
            .ledger
            .balance(&request.user_id)
            .map_err(|source| DrawError::Ledger {
                step: LedgerStep::Balance,
                source,
            })?;
        if balance < cost {
            tracing::debug!(
                "User {} has {} but needs {}",
                request.user_id,
                balance,
                cost
            );
            return Err(DrawError::InsufficientFunds {
                required: cost,
                available: Some(balance),
            });
        }

        match self.ledger.debit(&request.user_id, cost) {
            Ok(()) => {
                tracing::debug!("Debited {} from user {}", cost, request.user_id);
                Ok(())
            }
            Err(LedgerError::InsufficientFunds { required, available }) => {
                Err(DrawError::InsufficientFunds { required, available })
            }
            Err(source) => {
                if matches!(source, LedgerError::Indeterminate(_)) {
                    tracing::error!(
                        "Debit of {} for user {} may have committed: {}",
                        cost,
                        request.user_id,
                        source
                    );
                }
                Err(DrawError::Ledger {
                    step: LedgerStep::Debit,
                    source,
                })
            }
        }
    }

    /// Steps 6 to 9. Runs after the debit, filling `results`, which already
    /// has room for every draw.
    fn grant(
        &self,
        request: &DrawRequest,
        mut results: Vec<DrawnCharacter>,
    ) -> EconomyResult<DrawResult> {
        let incomplete = |granted: u64, reason: String| DrawError::GrantIncomplete {
            user_id: request.user_id.clone(),
            debited: request.times,
            granted,
            reason,
        };

        let times = usize::try_from(request.times)
            .map_err(|_| incomplete(0, format!("{} draws exceed addressable memory", request.times)))?;

        let entries = self
            .catalog
            .list_entries(request.gacha_id)
            .map_err(|e| incomplete(0, e.to_string()))?;
        let selector = WeightedSelector::new(&entries).map_err(|e| incomplete(0, e.to_string()))?;

        let mut rng = self.entropy.draw_rng();
        let mut batcher = OwnershipBatcher::new(&*self.store, self.config.batch_size, times);

        for _ in 0..times {
            let index = selector.draw_index(&mut rng);
            results.push(character(&entries[index]));
            let record = OwnershipRecord::new(&*request.user_id, entries[index].entry_id.clone());
            if let Err(e) = batcher.push(record) {
                return Err(incomplete(batcher.stats().records, e.to_string()));
            }
        }
        if let Err(e) = batcher.flush() {
            return Err(incomplete(batcher.stats().records, e.to_string()));
        }

        let stats = batcher.stats();
        tracing::debug!(
            "Persisted {} ownership records in {} batches",
            stats.records,
            stats.batches
        );

        Ok(DrawResult { results })
    }
}

impl std::fmt::Debug for DrawEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawEngine")
            .field("config", &self.config)
            .field("atomic_debit", &self.ledger.atomic_debit())
            .finish_non_exhaustive()
    }
}

/// Allocates the result buffer before any currency moves, so a draw too
/// large for memory is refused instead of failing after the debit.
fn reserve_results(request: &DrawRequest) -> EconomyResult<Vec<DrawnCharacter>> {
    let times = usize::try_from(request.times).map_err(|_| {
        DrawError::InvalidArgument(format!("times {} is too large", request.times))
    })?;
    let mut results = Vec::new();
    results.try_reserve_exact(times).map_err(|e| {
        DrawError::InvalidArgument(format!("times {times} is too large: {e}"))
    })?;
    Ok(results)
}

fn character(entry: &CatalogEntry) -> DrawnCharacter {
    DrawnCharacter {
        character_id: entry.entry_id.clone(),
        name: entry.name.clone(),
    }
}
