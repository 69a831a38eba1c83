//! Wallet session controller: owns the single session for a mounted
//! counter view and drives the connect / call / confirm lifecycle.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    contract::ContractInterface,
    domain::{Address, Signer},
    session::{Session, SessionStatus},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use wallet_integration::{
    ContractBinding, ContractFactory, TxReceipt, WalletError, WalletEvent, WalletProvider,
};

use crate::{
    error::{CounterAction, SessionError},
    options::ControllerOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Changed(Session),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// The session was not in a state that accepts the action; nothing was called.
    Ignored,
    /// The binding changed while the action was in flight; its result was dropped.
    Superseded,
    Failed(shared::error::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectTrigger {
    User,
    Background,
}

pub struct MissingContractFactory;

#[async_trait]
impl ContractFactory for MissingContractFactory {
    async fn bind(
        &self,
        interface: ContractInterface,
        _signer: Signer,
    ) -> Result<Arc<dyn ContractBinding>> {
        Err(anyhow!(
            "contract binding unavailable for {}",
            interface.address
        ))
    }
}

struct SessionState {
    session: Session,
    binding: Option<Arc<dyn ContractBinding>>,
    epoch: u64,
    /// Set when the wallet changes while an authorization is pending.
    rebind_pending: bool,
}

impl SessionState {
    fn record_error(&mut self, err: &SessionError) {
        self.session.last_error = Some(err.user_message().to_string());
        self.session.last_error_kind = Some(err.kind());
    }

    fn clear_error(&mut self) {
        self.session.last_error = None;
        self.session.last_error_kind = None;
    }

    fn drop_binding(&mut self) {
        self.epoch += 1;
        self.binding = None;
        self.session.status = SessionStatus::Disconnected;
        self.session.account = None;
        self.session.count = 0;
    }
}

pub struct WalletSessionController {
    provider: Option<Arc<dyn WalletProvider>>,
    contracts: Arc<dyn ContractFactory>,
    interface: ContractInterface,
    options: ControllerOptions,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl WalletSessionController {
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        contracts: Arc<dyn ContractFactory>,
    ) -> Arc<Self> {
        Self::new_with_options(provider, contracts, ControllerOptions::default())
    }

    pub fn without_provider() -> Arc<Self> {
        Self::new(None, Arc::new(MissingContractFactory))
    }

    pub fn new_with_options(
        provider: Option<Arc<dyn WalletProvider>>,
        contracts: Arc<dyn ContractFactory>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            provider,
            contracts,
            interface: ContractInterface::counter(),
            options,
            inner: Mutex::new(SessionState {
                session: Session::default(),
                binding: None,
                epoch: 0,
                rebind_pending: false,
            }),
            events,
        })
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, state: &SessionState) {
        let _ = self
            .events
            .send(SessionEvent::Changed(state.session.clone()));
    }

    /// Non-interactive reconnect for a freshly mounted session. Never
    /// surfaces an error to the session.
    pub async fn mount(&self) -> ActionOutcome {
        let Some(provider) = self.provider.as_ref() else {
            debug!("wallet: mount skipped, no provider present");
            return ActionOutcome::Ignored;
        };

        match provider.get_accounts().await {
            Ok(accounts) if !accounts.is_empty() => {
                debug!(
                    "wallet: mount found authorized accounts count={}",
                    accounts.len()
                );
                self.connect_with(ConnectTrigger::Background).await
            }
            Ok(_) => ActionOutcome::Ignored,
            Err(err) => {
                warn!("wallet: connection check failed err={err:#}");
                ActionOutcome::Ignored
            }
        }
    }

    pub async fn connect(&self) -> ActionOutcome {
        self.connect_with(ConnectTrigger::User).await
    }

    async fn connect_with(&self, trigger: ConnectTrigger) -> ActionOutcome {
        let Some(provider) = self.provider.clone() else {
            let mut state = self.inner.lock().await;
            if state.session.status != SessionStatus::Disconnected {
                return ActionOutcome::Ignored;
            }
            let err = SessionError::ProviderUnavailable;
            warn!("wallet: connect failed err={err}");
            if trigger == ConnectTrigger::User {
                state.record_error(&err);
                self.publish(&state);
            }
            return ActionOutcome::Failed(err.kind());
        };

        let epoch = {
            let mut state = self.inner.lock().await;
            if state.session.status != SessionStatus::Disconnected {
                debug!(
                    "wallet: connect ignored status={:?}",
                    state.session.status
                );
                return ActionOutcome::Ignored;
            }
            state.session.status = SessionStatus::Connecting;
            state.rebind_pending = false;
            if trigger == ConnectTrigger::User {
                state.clear_error();
            }
            self.publish(&state);
            state.epoch
        };

        let mut binding = match self.establish(provider.as_ref()).await {
            Ok(binding) => binding,
            Err(source) => return self.connect_failed(epoch, trigger, source).await,
        };

        // Initial read runs while still Connecting.
        loop {
            let initial_count = binding.get_count().await;
            let account = binding.signer().address;
            let mut state = self.inner.lock().await;
            if state.epoch != epoch {
                debug!("wallet: connect superseded account={account}");
                return ActionOutcome::Superseded;
            }
            if std::mem::take(&mut state.rebind_pending) {
                drop(state);
                debug!("wallet: wallet changed during connect, rebinding account={account}");
                binding = match self.bind_signer(provider.as_ref()).await {
                    Ok(binding) => binding,
                    Err(source) => return self.connect_failed(epoch, trigger, source).await,
                };
                continue;
            }

            state.epoch += 1;
            state.binding = Some(Arc::clone(&binding));
            state.session.status = SessionStatus::Connected;
            state.session.account = Some(account);
            state.clear_error();
            match initial_count {
                Ok(count) => state.session.count = count,
                Err(source) => {
                    let err = SessionError::ReadFailed(format!("{source:#}"));
                    warn!("wallet: initial count read failed err={err}");
                    state.session.count = 0;
                    if trigger == ConnectTrigger::User {
                        state.record_error(&err);
                    }
                }
            }
            self.publish(&state);
            drop(state);

            info!(
                "wallet: connected account={account} contract={}",
                binding.address()
            );
            return ActionOutcome::Completed;
        }
    }

    async fn connect_failed(
        &self,
        epoch: u64,
        trigger: ConnectTrigger,
        source: anyhow::Error,
    ) -> ActionOutcome {
        let err = SessionError::ConnectionRejected(format!("{source:#}"));
        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            return ActionOutcome::Superseded;
        }
        state.session.status = SessionStatus::Disconnected;
        match trigger {
            ConnectTrigger::User => {
                warn!("wallet: connection failed err={err}");
                state.record_error(&err);
            }
            ConnectTrigger::Background => {
                debug!("wallet: background reconnect failed err={err}");
            }
        }
        self.publish(&state);
        ActionOutcome::Failed(err.kind())
    }

    async fn establish(&self, provider: &dyn WalletProvider) -> Result<Arc<dyn ContractBinding>> {
        let accounts = provider.request_accounts().await?;
        if accounts.is_empty() {
            return Err(WalletError::NoAccount.into());
        }
        self.bind_signer(provider).await
    }

    /// Binds against the provider's current signer without prompting.
    async fn bind_signer(&self, provider: &dyn WalletProvider) -> Result<Arc<dyn ContractBinding>> {
        let signer = provider.signer().await?;
        self.contracts.bind(self.interface.clone(), signer).await
    }

    pub async fn increment(&self) -> ActionOutcome {
        self.run_action(CounterAction::Increment).await
    }

    pub async fn decrement(&self) -> ActionOutcome {
        self.run_action(CounterAction::Decrement).await
    }

    pub async fn reset(&self) -> ActionOutcome {
        self.run_action(CounterAction::Reset).await
    }

    async fn run_action(&self, action: CounterAction) -> ActionOutcome {
        let Some((binding, epoch)) = self.begin(action.name()).await else {
            return ActionOutcome::Ignored;
        };

        let receipt = match submit_and_confirm(binding.as_ref(), action).await {
            Ok(receipt) => receipt,
            Err(source) => {
                let err = SessionError::TransactionFailed {
                    action,
                    reason: format!("{source:#}"),
                };
                return self.fail(epoch, err).await;
            }
        };
        info!(
            "counter: {action} confirmed tx={} block={}",
            receipt.tx_hash,
            receipt
                .block_number
                .map(|block| block.to_string())
                .unwrap_or_else(|| "pending".to_string())
        );
        for event in &receipt.counter_increased {
            info!(
                "counter: CounterIncreased new_value={} incrementor={}",
                event.new_value, event.incrementor
            );
        }

        if !self.options.count_refresh.should_refresh(action) {
            return self.finish(epoch, None).await;
        }

        match binding.get_count().await {
            Ok(count) => self.finish(epoch, Some(count)).await,
            Err(source) => {
                self.fail(epoch, SessionError::ReadFailed(format!("{source:#}")))
                    .await
            }
        }
    }

    /// Re-reads the count with a view call.
    pub async fn get_count(&self) -> ActionOutcome {
        let Some((binding, epoch)) = self.begin("getCount").await else {
            return ActionOutcome::Ignored;
        };
        match binding.get_count().await {
            Ok(count) => self.finish(epoch, Some(count)).await,
            Err(source) => {
                self.fail(epoch, SessionError::ReadFailed(format!("{source:#}")))
                    .await
            }
        }
    }

    pub async fn contract_owner(&self) -> Option<Address> {
        let (binding, epoch) = self.begin("owner").await?;
        match binding.owner().await {
            Ok(owner) => match self.finish(epoch, None).await {
                ActionOutcome::Completed => Some(owner),
                _ => None,
            },
            Err(source) => {
                self.fail(epoch, SessionError::ReadFailed(format!("{source:#}")))
                    .await;
                None
            }
        }
    }

    async fn begin(&self, label: &'static str) -> Option<(Arc<dyn ContractBinding>, u64)> {
        let mut state = self.inner.lock().await;
        if state.session.status != SessionStatus::Connected {
            debug!(
                "counter: {label} ignored status={:?}",
                state.session.status
            );
            return None;
        }
        let binding = Arc::clone(state.binding.as_ref()?);
        state.session.status = SessionStatus::Acting;
        self.publish(&state);
        Some((binding, state.epoch))
    }

    async fn finish(&self, epoch: u64, count: Option<u64>) -> ActionOutcome {
        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            debug!("counter: result dropped, binding replaced mid-action");
            return ActionOutcome::Superseded;
        }
        state.session.status = SessionStatus::Connected;
        if let Some(count) = count {
            state.session.count = count;
        }
        state.clear_error();
        self.publish(&state);
        ActionOutcome::Completed
    }

    async fn fail(&self, epoch: u64, err: SessionError) -> ActionOutcome {
        warn!("counter: action failed err={err}");
        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            return ActionOutcome::Superseded;
        }
        state.session.status = SessionStatus::Connected;
        state.record_error(&err);
        self.publish(&state);
        ActionOutcome::Failed(err.kind())
    }

    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                if self.defer_to_pending_connect().await {
                    return;
                }
                let current = self.inner.lock().await.session.account;
                if current.is_some() && accounts.first() == current.as_ref() {
                    return;
                }
                info!(
                    "wallet: accounts changed previous={:?} next={:?}",
                    current,
                    accounts.first()
                );
                self.invalidate().await;
                if !accounts.is_empty() {
                    self.connect_with(ConnectTrigger::Background).await;
                }
            }
            WalletEvent::ChainChanged(chain_id) => {
                if self.defer_to_pending_connect().await {
                    return;
                }
                let was_active = self.invalidate().await;
                info!("wallet: chain changed chain_id={chain_id} was_active={was_active}");
                if was_active {
                    self.connect_with(ConnectTrigger::Background).await;
                }
            }
            WalletEvent::Disconnected => {
                info!("wallet: provider disconnected");
                self.invalidate().await;
            }
        }
    }

    /// Marks a pending connect for rebinding instead of starting another
    /// authorization.
    async fn defer_to_pending_connect(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.session.status != SessionStatus::Connecting {
            return false;
        }
        debug!("wallet: change during connect, deferring to pending authorization");
        state.rebind_pending = true;
        true
    }

    /// Drops the binding and returns whether the session held or was acquiring one.
    async fn invalidate(&self) -> bool {
        let mut state = self.inner.lock().await;
        let was_active = state.session.status != SessionStatus::Disconnected;
        state.drop_binding();
        if was_active {
            self.publish(&state);
        }
        was_active
    }

    /// Feeds provider notifications into the session until the provider
    /// stream closes.
    pub fn spawn_event_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.provider.as_ref()?.subscribe_events();
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.handle_wallet_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("wallet: event listener lagged skipped={skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

async fn submit_and_confirm(
    binding: &dyn ContractBinding,
    action: CounterAction,
) -> Result<TxReceipt> {
    let pending = match action {
        CounterAction::Increment => binding.increment().await?,
        CounterAction::Decrement => binding.decrement().await?,
        CounterAction::Reset => binding.reset_counter().await?,
    };
    debug!("counter: {action} submitted tx={}", pending.tx_hash());
    pending.wait().await
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
