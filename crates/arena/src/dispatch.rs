//! Command dispatch: one inbound command to completion.
//!
//! The dispatcher validates a [`ClientCommand`], calls the account
//! gateway and the registry, and queues every resulting event: replies
//! on the sender's own handle, notifications on other entrants' handles.
//! Failures come back as [`DispatchError`] and are reported to the
//! sender only; none of them ends the connection.

use std::sync::Arc;

use arena_account::{AccountError, AccountStore, CredentialHasher};
use arena_protocol::{ClientCommand, ServerEvent};
use arena_registry::{ArenaRegistry, Entrant, Hit};

use crate::{ArenaConfig, Session};

/// Why a command was refused. The `Display` text is what the client
/// sees in its `error` message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A required field was empty after trimming.
    #[error("{0}")]
    InvalidInput(String),

    /// The username is already registered.
    #[error("mage {0} already exists")]
    AlreadyExists(String),

    /// Unknown account or target.
    #[error("{0}")]
    NotFound(String),

    /// Wrong username/password pair.
    #[error("Invalid username/password")]
    Unauthorized,

    /// The command needs the sender to be in the arena.
    #[error("not joined to arena")]
    NotJoined,

    /// The account store failed.
    #[error("{0}")]
    StorageFailure(String),

    /// Hashing or verifying the password failed.
    #[error("password hashing failed: {0}")]
    HashFailure(String),
}

impl From<AccountError> for DispatchError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::AlreadyExists(name) => Self::AlreadyExists(name),
            AccountError::NotFound(_) => Self::NotFound("mage not found".into()),
            AccountError::Storage(msg) => Self::StorageFailure(msg),
            AccountError::Hash(msg) => Self::HashFailure(msg),
        }
    }
}

const NO_TARGET: &str = "no target found";

/// Routes commands against the shared registry and the account gateway.
pub struct Dispatcher<S, H> {
    registry: ArenaRegistry,
    store: S,
    hasher: Arc<H>,
    fireball_damage: i32,
    max_hp: i32,
}

impl<S: AccountStore, H: CredentialHasher> Dispatcher<S, H> {
    /// Creates a dispatcher using the combat numbers from `config`.
    pub fn new(registry: ArenaRegistry, store: S, hasher: H, config: &ArenaConfig) -> Self {
        Self {
            registry,
            store,
            hasher: Arc::new(hasher),
            fireball_damage: config.fireball_damage,
            max_hp: config.max_hp,
        }
    }

    pub fn registry(&self) -> &ArenaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles one command from `session`'s connection.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        command: ClientCommand,
    ) -> Result<(), DispatchError> {
        match command {
            ClientCommand::Register { username, password } => {
                self.register(session, &username, &password).await
            }
            ClientCommand::Join { username, password } => {
                self.join(session, &username, &password).await
            }
            ClientCommand::Fireball { target } => self.fireball(session, &target).await,
            ClientCommand::Unknown => {
                tracing::debug!(conn_id = %session.connection_id(), "ignoring unknown command");
                Ok(())
            }
        }
    }

    async fn register(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Result<(), DispatchError> {
        let (username, password) = validate(username, password)?;

        let hash = self.hash_password(password.to_string()).await?;
        self.store.create(username, &hash).await?;

        tracing::info!(conn_id = %session.connection_id(), username, "mage registered");
        session.reply(ServerEvent::ok());
        Ok(())
    }

    async fn join(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<(), DispatchError> {
        let username = username.trim();
        let password = password.trim();

        let account = self.store.get(username).await?;
        if !self.verify_password(password.to_string(), account.password_hash.clone()).await? {
            return Err(DispatchError::Unauthorized);
        }
        let username = account.username.as_str();

        // Leave the previous identity before taking the new one.
        session.leave_arena().await;

        // Retire whoever holds the name now, so no hit lands on it after
        // its hp has been carried over.
        let carried = match self.registry.lookup(username).await {
            Some(current) => Some(current.retire().await),
            None => None,
        };
        // Every removed entrant was retired first, so with nobody holding
        // the name the stored hp is final.
        let mut hp = match carried {
            Some(hp) => hp,
            None => self.store.get(username).await?.hp,
        };

        if hp <= 0 {
            self.store.update_hp(username, self.max_hp).await?;
            hp = self.max_hp;
            tracing::info!(username, "dead mage resurrected");
        }

        let entrant = Entrant::new(account.id, username, hp, session.outbound().clone());
        let entrant_id = entrant.id();

        if let Some(displaced) = self.registry.add(entrant).await {
            // Another connection held this username; it is out now.
            displaced.retire().await;
            displaced.outbound().send(ServerEvent::left(displaced.username()));
            displaced.outbound().evict(displaced.id());
            self.registry
                .broadcast_except(username, ServerEvent::left(username))
                .await;
        }
        session.bind(username.to_string(), entrant_id);

        let roster = self
            .registry
            .broadcast_except(username, ServerEvent::joined(username))
            .await;

        tracing::info!(
            conn_id = %session.connection_id(),
            account = %account.id,
            username,
            hp,
            "mage joined the arena"
        );
        session.reply(ServerEvent::Health { hp, mages: roster });
        Ok(())
    }

    async fn fireball(&self, session: &Session, target: &str) -> Result<(), DispatchError> {
        let sender = self.attacker(session).await?;
        let attacker = sender.username();

        let victim = self
            .registry
            .lookup(target)
            .await
            .ok_or_else(|| DispatchError::NotFound(NO_TARGET.into()))?;

        let store = &self.store;
        let hit = victim
            .strike(self.fireball_damage, |hp| store.update_hp(victim.username(), hp))
            .await?;

        let (hp, lethal) = match hit {
            Hit::Landed { hp, lethal } => (hp, lethal),
            Hit::Missed => return Err(DispatchError::NotFound(NO_TARGET.into())),
        };

        tracing::debug!(attacker, target = victim.username(), hp, "fireball landed");
        victim.outbound().send(ServerEvent::attack(attacker, hp));

        if lethal {
            victim.outbound().send(ServerEvent::slain(attacker));
            if self.registry.remove_entrant(victim.username(), victim.id()).await {
                self.registry
                    .broadcast_except(victim.username(), ServerEvent::died(victim.username(), attacker))
                    .await;
            }
            victim.outbound().close();
            tracing::info!(
                victim = victim.username(),
                account = %victim.account_id(),
                killer = attacker,
                "mage died"
            );
        }
        Ok(())
    }

    /// The sender's live entrant. A session whose entrant was displaced
    /// or killed, but which has not yet processed that notice, is no
    /// longer in the arena.
    async fn attacker(&self, session: &Session) -> Result<Entrant, DispatchError> {
        let (Some(username), Some(id)) = (session.phase().username(), session.phase().entrant())
        else {
            return Err(DispatchError::NotJoined);
        };
        let entrant = self
            .registry
            .lookup(username)
            .await
            .filter(|e| e.id() == id)
            .ok_or(DispatchError::NotJoined)?;
        if !entrant.is_alive().await {
            return Err(DispatchError::NotJoined);
        }
        Ok(entrant)
    }

    async fn hash_password(&self, password: String) -> Result<String, DispatchError> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DispatchError::HashFailure(e.to_string()))??;
        Ok(hash)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, DispatchError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| DispatchError::HashFailure(e.to_string()))
    }
}

/// Trims both credentials and rejects empty ones.
fn validate<'a>(username: &'a str, password: &'a str) -> Result<(&'a str, &'a str), DispatchError> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() {
        return Err(DispatchError::InvalidInput("empty username".into()));
    }
    if password.is_empty() {
        return Err(DispatchError::InvalidInput("empty password".into()));
    }
    Ok((username, password))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Dispatcher tests drive sessions directly through their outbound
    //! queues, without sockets.

    use std::sync::atomic::{AtomicBool, Ordering};

    use arena_account::{Account, Argon2Hasher, MemoryAccountStore};
    use arena_registry::{Delivery, Inbox, outbound_channel};
    use arena_transport::ConnectionId;

    use super::*;
    use crate::Phase;

    // -- Helpers ----------------------------------------------------------

    /// Memory store whose `update_hp` can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryAccountStore,
        fail_updates: AtomicBool,
    }

    impl AccountStore for FlakyStore {
        async fn create(&self, username: &str, hash: &str) -> Result<(), AccountError> {
            self.inner.create(username, hash).await
        }

        async fn get(&self, username: &str) -> Result<Account, AccountError> {
            self.inner.get(username).await
        }

        async fn update_hp(&self, username: &str, hp: i32) -> Result<(), AccountError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(AccountError::Storage("connection reset by database".into()));
            }
            self.inner.update_hp(username, hp).await
        }
    }

    type TestDispatcher = Dispatcher<FlakyStore, Argon2Hasher>;

    fn dispatcher() -> TestDispatcher {
        Dispatcher::new(
            ArenaRegistry::new(),
            FlakyStore::default(),
            Argon2Hasher::with_cost(8, 1, 1).expect("valid params"),
            &ArenaConfig::default(),
        )
    }

    fn connect(d: &TestDispatcher, conn: u64) -> (Session, Inbox) {
        let (handle, inbox) = outbound_channel(ConnectionId::new(conn));
        (Session::new(handle, d.registry().clone()), inbox)
    }

    fn drain(inbox: &mut Inbox) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(d) = inbox.try_recv() {
            out.push(d);
        }
        out
    }

    fn events(inbox: &mut Inbox) -> Vec<ServerEvent> {
        drain(inbox)
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn register_cmd(u: &str, p: &str) -> ClientCommand {
        ClientCommand::Register {
            username: u.into(),
            password: p.into(),
        }
    }

    fn join_cmd(u: &str, p: &str) -> ClientCommand {
        ClientCommand::Join {
            username: u.into(),
            password: p.into(),
        }
    }

    fn fireball_cmd(t: &str) -> ClientCommand {
        ClientCommand::Fireball { target: t.into() }
    }

    /// Registers and joins `name` on a fresh connection, clearing its inbox.
    async fn enter(d: &TestDispatcher, conn: u64, name: &str) -> (Session, Inbox) {
        let (mut s, mut rx) = connect(d, conn);
        d.dispatch(&mut s, register_cmd(name, "pw")).await.unwrap();
        d.dispatch(&mut s, join_cmd(name, "pw")).await.unwrap();
        drain(&mut rx);
        (s, rx)
    }

    // =====================================================================
    // register
    // =====================================================================

    #[tokio::test]
    async fn test_register_valid_replies_ok_and_stores_hash() {
        let d = dispatcher();
        let (mut s, mut rx) = connect(&d, 1);

        d.dispatch(&mut s, register_cmd("  zed ", " pw ")).await.unwrap();

        assert_eq!(events(&mut rx), vec![ServerEvent::ok()]);
        let account = d.store().get("zed").await.unwrap();
        assert_ne!(account.password_hash, "pw");
        assert_eq!(account.hp, 100);
        assert!(d.registry().is_empty().await, "register never enters the arena");
    }

    #[tokio::test]
    async fn test_register_empty_fields_invalid_input() {
        let d = dispatcher();
        let (mut s, _rx) = connect(&d, 1);

        let no_name = d.dispatch(&mut s, register_cmd("   ", "pw")).await;
        let no_pass = d.dispatch(&mut s, register_cmd("zed", "  ")).await;

        assert_eq!(no_name, Err(DispatchError::InvalidInput("empty username".into())));
        assert_eq!(no_pass, Err(DispatchError::InvalidInput("empty password".into())));
        assert!(d.store().inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_twice_already_exists_single_record() {
        let d = dispatcher();
        let (mut s, _rx) = connect(&d, 1);

        d.dispatch(&mut s, register_cmd("zed", "pw")).await.unwrap();
        let second = d.dispatch(&mut s, register_cmd("zed", "other")).await;

        assert_eq!(second, Err(DispatchError::AlreadyExists("zed".into())));
        assert_eq!(second.unwrap_err().to_string(), "mage zed already exists");
        assert_eq!(d.store().inner.len().await, 1);
    }

    // =====================================================================
    // join
    // =====================================================================

    #[tokio::test]
    async fn test_join_first_mage_gets_full_health_empty_roster() {
        let d = dispatcher();
        let (mut s, mut rx) = connect(&d, 1);
        d.dispatch(&mut s, register_cmd("zed", "pw")).await.unwrap();
        drain(&mut rx);

        d.dispatch(&mut s, join_cmd("zed", "pw")).await.unwrap();

        assert_eq!(
            events(&mut rx),
            vec![ServerEvent::Health { hp: 100, mages: vec![] }]
        );
        assert_eq!(s.phase().username(), Some("zed"));
        assert!(d.registry().contains("zed").await);
    }

    #[tokio::test]
    async fn test_join_second_mage_notifies_first_and_lists_roster() {
        let d = dispatcher();
        let (_zed, mut zed_rx) = enter(&d, 1, "zed").await;

        let (mut kay, mut kay_rx) = connect(&d, 2);
        d.dispatch(&mut kay, register_cmd("kay", "pw")).await.unwrap();
        d.dispatch(&mut kay, join_cmd("kay", "pw")).await.unwrap();

        assert_eq!(events(&mut zed_rx), vec![ServerEvent::joined("kay")]);
        assert_eq!(
            events(&mut kay_rx),
            vec![
                ServerEvent::ok(),
                ServerEvent::Health { hp: 100, mages: vec!["zed".into()] },
            ]
        );
    }

    #[tokio::test]
    async fn test_join_wrong_password_changes_nothing() {
        let d = dispatcher();
        let (mut s, mut rx) = connect(&d, 1);
        d.dispatch(&mut s, register_cmd("zed", "pw")).await.unwrap();
        drain(&mut rx);

        let result = d.dispatch(&mut s, join_cmd("zed", "nope")).await;

        assert_eq!(result, Err(DispatchError::Unauthorized));
        assert_eq!(result.unwrap_err().to_string(), "Invalid username/password");
        assert_eq!(s.phase(), &Phase::Unauthenticated);
        assert!(d.registry().is_empty().await);
        assert_eq!(d.store().get("zed").await.unwrap().hp, 100);
        assert!(events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_account_not_found() {
        let d = dispatcher();
        let (mut s, _rx) = connect(&d, 1);

        let result = d.dispatch(&mut s, join_cmd("ghost", "pw")).await;

        assert_eq!(result, Err(DispatchError::NotFound("mage not found".into())));
        assert_eq!(s.phase(), &Phase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_join_dead_account_resurrects_to_full_hp() {
        let d = dispatcher();
        let (mut s, mut rx) = connect(&d, 1);
        d.dispatch(&mut s, register_cmd("zed", "pw")).await.unwrap();
        d.store().update_hp("zed", 0).await.unwrap();
        drain(&mut rx);

        d.dispatch(&mut s, join_cmd("zed", "pw")).await.unwrap();

        assert_eq!(d.store().get("zed").await.unwrap().hp, 100);
        assert_eq!(d.registry().lookup("zed").await.unwrap().hp().await, 100);
        assert_eq!(
            events(&mut rx),
            vec![ServerEvent::Health { hp: 100, mages: vec![] }]
        );
    }

    #[tokio::test]
    async fn test_rejoin_switches_identity_and_announces_left() {
        let d = dispatcher();
        let (_kay, mut kay_rx) = enter(&d, 2, "kay").await;
        let (mut s, mut rx) = enter(&d, 1, "zed").await;
        drain(&mut kay_rx);
        d.dispatch(&mut s, register_cmd("ash", "pw")).await.unwrap();

        d.dispatch(&mut s, join_cmd("ash", "pw")).await.unwrap();

        assert_eq!(
            events(&mut kay_rx),
            vec![ServerEvent::left("zed"), ServerEvent::joined("ash")]
        );
        assert_eq!(s.phase().username(), Some("ash"));
        assert!(!d.registry().contains("zed").await);
        assert_eq!(d.registry().len().await, 2);
        assert_eq!(
            events(&mut rx).last(),
            Some(&ServerEvent::Health { hp: 100, mages: vec!["kay".into()] })
        );
    }

    #[tokio::test]
    async fn test_rejoin_same_name_keeps_single_entry() {
        let d = dispatcher();
        let (mut s, _rx) = enter(&d, 1, "zed").await;
        let before = d.registry().lookup("zed").await.unwrap().id();

        d.dispatch(&mut s, join_cmd("zed", "pw")).await.unwrap();

        assert_eq!(d.registry().len().await, 1);
        assert_ne!(d.registry().lookup("zed").await.unwrap().id(), before);
    }

    #[tokio::test]
    async fn test_join_same_name_elsewhere_evicts_older_connection() {
        let d = dispatcher();
        let (mut first, mut first_rx) = enter(&d, 1, "zed").await;
        let (_kay, mut kay_rx) = enter(&d, 3, "kay").await;
        drain(&mut first_rx);
        let (mut second, mut second_rx) = connect(&d, 2);

        d.dispatch(&mut second, join_cmd("zed", "pw")).await.unwrap();

        let deliveries = drain(&mut first_rx);
        assert_eq!(deliveries[0], Delivery::Event(ServerEvent::left("zed")));
        let Delivery::Evicted(id) = deliveries[1] else {
            panic!("expected eviction, got {:?}", deliveries[1]);
        };
        assert!(first.evicted(id));
        assert_eq!(
            events(&mut kay_rx),
            vec![ServerEvent::left("zed"), ServerEvent::joined("zed")]
        );
        assert_eq!(
            events(&mut second_rx),
            vec![ServerEvent::Health { hp: 100, mages: vec!["kay".into()] }]
        );

        // The displaced session's cleanup must not touch the new entrant.
        first.terminate().await;
        assert_eq!(
            d.registry().lookup("zed").await.unwrap().outbound().connection_id(),
            ConnectionId::new(2)
        );
    }

    #[tokio::test]
    async fn test_displaced_entrant_takes_no_more_hits() {
        let d = dispatcher();
        let (_first, _first_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;
        let stale = d.registry().lookup("zed").await.unwrap();
        let (mut second, mut second_rx) = connect(&d, 3);
        d.dispatch(&mut second, join_cmd("zed", "pw")).await.unwrap();
        drain(&mut second_rx);

        // A fireball that resolved the old entrant before the join.
        let store = d.store();
        let stale_hit = stale
            .strike(10, |hp| store.update_hp("zed", hp))
            .await
            .unwrap();
        assert_eq!(stale_hit, Hit::Missed);
        assert_eq!(d.store().get("zed").await.unwrap().hp, 100);

        d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
        assert_eq!(d.store().get("zed").await.unwrap().hp, 90);
        assert_eq!(events(&mut second_rx), vec![ServerEvent::attack("kay", 90)]);
    }

    #[tokio::test]
    async fn test_join_elsewhere_carries_damage_over() {
        let d = dispatcher();
        let (_first, _first_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;
        d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();

        let (mut second, mut second_rx) = connect(&d, 3);
        d.dispatch(&mut second, join_cmd("zed", "pw")).await.unwrap();
        assert_eq!(
            events(&mut second_rx),
            vec![ServerEvent::Health { hp: 90, mages: vec!["kay".into()] }]
        );

        d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
        assert_eq!(d.store().get("zed").await.unwrap().hp, 80);
        assert_eq!(events(&mut second_rx), vec![ServerEvent::attack("kay", 80)]);
    }

    #[tokio::test]
    async fn test_rejoin_same_connection_keeps_damage() {
        let d = dispatcher();
        let (mut zed, mut zed_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;
        d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
        drain(&mut zed_rx);

        d.dispatch(&mut zed, join_cmd("zed", "pw")).await.unwrap();

        assert_eq!(
            events(&mut zed_rx),
            vec![ServerEvent::Health { hp: 90, mages: vec!["kay".into()] }]
        );
        assert_eq!(d.registry().lookup("zed").await.unwrap().hp().await, 90);
    }

    // =====================================================================
    // fireball
    // =====================================================================

    #[tokio::test]
    async fn test_fireball_from_displaced_session_not_joined() {
        let d = dispatcher();
        let (mut first, _first_rx) = enter(&d, 1, "zed").await;
        let (_kay, mut kay_rx) = enter(&d, 2, "kay").await;
        let (mut second, _second_rx) = connect(&d, 3);
        d.dispatch(&mut second, join_cmd("zed", "pw")).await.unwrap();
        drain(&mut kay_rx);

        // The eviction notice is still queued, so the phase is stale.
        assert!(first.phase().is_active());
        let result = d.dispatch(&mut first, fireball_cmd("kay")).await;

        assert_eq!(result, Err(DispatchError::NotJoined));
        assert_eq!(d.store().get("kay").await.unwrap().hp, 100);
        assert!(events(&mut kay_rx).is_empty());
    }

    #[tokio::test]
    async fn test_fireball_from_dead_session_not_joined() {
        let d = dispatcher();
        let (mut zed, _zed_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;
        for _ in 0..10 {
            d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
        }

        let result = d.dispatch(&mut zed, fireball_cmd("kay")).await;

        assert_eq!(result, Err(DispatchError::NotJoined));
        assert_eq!(d.store().get("kay").await.unwrap().hp, 100);
    }

    #[tokio::test]
    async fn test_fireball_before_join_not_joined() {
        let d = dispatcher();
        let (_zed, _rx) = enter(&d, 1, "zed").await;
        let (mut s, _srx) = connect(&d, 2);

        let result = d.dispatch(&mut s, fireball_cmd("zed")).await;

        assert_eq!(result, Err(DispatchError::NotJoined));
        assert_eq!(s.phase(), &Phase::Unauthenticated);
        assert_eq!(d.store().get("zed").await.unwrap().hp, 100);
    }

    #[tokio::test]
    async fn test_fireball_unknown_target_no_target_found() {
        let d = dispatcher();
        let (mut kay, _rx) = enter(&d, 1, "kay").await;

        let result = d.dispatch(&mut kay, fireball_cmd("nobody")).await;

        assert_eq!(result.unwrap_err().to_string(), "no target found");
        assert_eq!(d.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_fireball_hits_are_persisted() {
        let d = dispatcher();
        let (_zed, mut zed_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;

        for n in 1..=3 {
            d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
            assert_eq!(d.store().get("zed").await.unwrap().hp, 100 - 10 * n);
        }

        assert_eq!(
            events(&mut zed_rx),
            vec![
                ServerEvent::attack("kay", 90),
                ServerEvent::attack("kay", 80),
                ServerEvent::attack("kay", 70),
            ]
        );
    }

    #[tokio::test]
    async fn test_fireball_tenth_hit_kills_and_closes() {
        let d = dispatcher();
        let (_zed, mut zed_rx) = enter(&d, 1, "zed").await;
        let (mut kay, mut kay_rx) = enter(&d, 2, "kay").await;
        let (_ash, mut ash_rx) = enter(&d, 3, "ash").await;
        drain(&mut zed_rx);
        drain(&mut kay_rx);

        for _ in 0..10 {
            d.dispatch(&mut kay, fireball_cmd("zed")).await.unwrap();
        }

        let deliveries = drain(&mut zed_rx);
        assert_eq!(deliveries.len(), 12);
        for (i, delivery) in deliveries[..10].iter().enumerate() {
            let expected = 90 - 10 * i as i32;
            assert_eq!(delivery, &Delivery::Event(ServerEvent::attack("kay", expected)));
        }
        assert_eq!(deliveries[10], Delivery::Event(ServerEvent::slain("kay")));
        assert_eq!(deliveries[11], Delivery::Close);

        assert!(!d.registry().contains("zed").await);
        assert_eq!(d.store().get("zed").await.unwrap().hp, 0);
        assert_eq!(events(&mut kay_rx), vec![ServerEvent::died("zed", "kay")]);
        assert_eq!(events(&mut ash_rx), vec![ServerEvent::died("zed", "kay")]);

        let after = d.dispatch(&mut kay, fireball_cmd("zed")).await;
        assert_eq!(after, Err(DispatchError::NotFound(NO_TARGET.into())));
    }

    #[tokio::test]
    async fn test_fireball_storage_failure_leaves_hp_unchanged() {
        let d = dispatcher();
        let (_zed, mut zed_rx) = enter(&d, 1, "zed").await;
        let (mut kay, _kay_rx) = enter(&d, 2, "kay").await;
        d.store().fail_updates.store(true, Ordering::SeqCst);

        let result = d.dispatch(&mut kay, fireball_cmd("zed")).await;

        assert_eq!(
            result,
            Err(DispatchError::StorageFailure("connection reset by database".into()))
        );
        assert_eq!(d.registry().lookup("zed").await.unwrap().hp().await, 100);
        assert_eq!(d.store().get("zed").await.unwrap().hp, 100);
        assert!(events(&mut zed_rx).is_empty());
    }

    #[tokio::test]
    async fn test_fireball_at_self_is_allowed() {
        let d = dispatcher();
        let (mut zed, mut rx) = enter(&d, 1, "zed").await;

        d.dispatch(&mut zed, fireball_cmd("zed")).await.unwrap();

        assert_eq!(events(&mut rx), vec![ServerEvent::attack("zed", 90)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lethal_hits_die_once() {
        let d = Arc::new(dispatcher());
        let (_zed, mut zed_rx) = enter(&d, 1, "zed").await;
        d.store().update_hp("zed", 10).await.unwrap();
        d.registry().remove("zed").await;
        let (mut zed2, mut zed_rx2) = connect(&d, 9);
        d.dispatch(&mut zed2, join_cmd("zed", "pw")).await.unwrap();
        drain(&mut zed_rx);
        drain(&mut zed_rx2);

        let mut attackers = Vec::new();
        for i in 0..4u64 {
            let name = format!("m{i}");
            attackers.push(enter(&d, 10 + i, &name).await);
        }

        let mut tasks = Vec::new();
        for (mut session, inbox) in attackers {
            let d = Arc::clone(&d);
            tasks.push(tokio::spawn(async move {
                let result = d.dispatch(&mut session, fireball_cmd("zed")).await;
                (result, session, inbox)
            }));
        }
        let mut successes = 0;
        for task in tasks {
            let (result, _session, _inbox) = task.await.unwrap();
            if result.is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1, "only the fatal hit lands");
        let slain = drain(&mut zed_rx2)
            .into_iter()
            .filter(|d| matches!(d, Delivery::Event(ServerEvent::Died { by: Some(_), .. })))
            .count();
        assert_eq!(slain, 1);
    }
}
