// Lobby manager: the server's authority over lobbies and join handshakes.
//
// `LobbyManager` owns the lobby table. Each `LobbyRecord` has a host
// session and a roster of `PlayerEntry`s keyed by `RequestId`; an entry is
// created `Pending` by a join request and either flipped to `Accepted` or
// deleted by the host's decision. Like `SessionTable`, the manager lives on
// the server's event-loop thread and is never shared, so every operation is
// serialized by construction.
//
// Outbound traffic goes through the `Outbox` trait (`roster.rs`), which
// keeps the manager free of sockets and lets tests record deliveries.
//
// Handshake rules:
// - A join request without a lobby ID resolves to the only lobby. With zero
//   or several lobbies the request is declined with a reason,
//   never a guess.
// - A request naming an unknown lobby, and any decision naming an unknown
//   lobby/request or coming from a session that isn't the host, is logged
//   and otherwise ignored. Nothing is sent back.
// - Lobbies hold at most `capacity` entries, pending ones included.
// - There is no timeout: a pending entry waits until the host decides or
//   one side disconnects.
//
// Disconnects (`session_closed`): the departed session's entries are
// removed from every lobby, and every lobby it hosted is closed and the
// remaining entrants get `LOBBY_CLOSED`. A decision arriving later for a
// removed entry hits the unknown-request path.
//
// Discovery: creating a lobby points the broadcaster's advert at it. Closing
// the advertised lobby moves the advert to the newest lobby still open, or
// clears it when none is left.

use std::collections::BTreeMap;

use lanlobby_protocol::{
    ClientMessage, JoinOutcome, LobbyId, LobbySummary, RequestId, ServerMessage, SessionId,
    display_name_from_profile,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::discovery::{Advert, Announcer};
use crate::roster::Outbox;

/// Where a roster entry is in the join handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Accepted,
}

/// One player who asked to join a lobby.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerEntry {
    pub request_id: RequestId,
    pub name: String,
    pub session: SessionId,
    pub status: EntryStatus,
}

/// A lobby and its roster.
#[derive(Clone, Debug)]
pub struct LobbyRecord {
    pub id: LobbyId,
    pub name: String,
    /// Stored in clear text and reported as `has_password`, never checked.
    pub password: Option<String>,
    pub host: SessionId,
    pub host_name: String,
    roster: BTreeMap<RequestId, PlayerEntry>,
}

impl LobbyRecord {
    pub fn entry(&self, request_id: RequestId) -> Option<&PlayerEntry> {
        self.roster.get(&request_id)
    }

    pub fn occupancy(&self) -> usize {
        self.roster.len()
    }

    fn summary(&self, capacity: u32) -> LobbySummary {
        LobbySummary {
            id: self.id,
            name: self.name.clone(),
            occupancy: u32::try_from(self.roster.len()).unwrap_or(u32::MAX),
            capacity,
            has_password: self.password.is_some(),
        }
    }
}

/// Server-side owner of every lobby.
pub struct LobbyManager {
    lobbies: BTreeMap<LobbyId, LobbyRecord>,
    next_lobby_id: u64,
    next_request_id: u64,
    capacity: u32,
    announcer: Announcer,
    advertised: Option<LobbyId>,
}

impl LobbyManager {
    pub fn new(capacity: u32, announcer: Announcer) -> Self {
        Self {
            lobbies: BTreeMap::new(),
            next_lobby_id: 1,
            next_request_id: 1,
            capacity,
            announcer,
            advertised: None,
        }
    }

    /// Dispatch one client message to its handler.
    pub fn handle(&mut self, session: SessionId, message: ClientMessage, out: &mut impl Outbox) {
        match message {
            ClientMessage::CreateLobby {
                lobby_name,
                lobby_password,
                host_profile,
            } => {
                self.create_lobby(session, lobby_name, lobby_password, &host_profile, out);
            }
            ClientMessage::GetLobbies {} => {
                let list = ServerMessage::LobbyList(self.list_lobbies());
                out.send_to(session, &list);
            }
            ClientMessage::JoinRequest {
                lobby_id,
                player_name,
            } => {
                self.join_request(session, lobby_id, player_name, out);
            }
            ClientMessage::JoinDecision {
                lobby_id,
                request_id,
                accepted,
            } => {
                self.join_decision(session, lobby_id, request_id, accepted, out);
            }
            ClientMessage::Move(payload) => {
                // Movement isn't simulated server-side yet.
                debug!(%session, %payload, "move ignored");
            }
        }
    }

    /// Create a lobby hosted by `session`, advertise it, and confirm to the
    /// caller. An empty password counts as none.
    pub fn create_lobby(
        &mut self,
        session: SessionId,
        name: String,
        password: Option<String>,
        host_profile: &Value,
        out: &mut impl Outbox,
    ) -> LobbyId {
        let id = LobbyId(self.next_lobby_id);
        self.next_lobby_id += 1;
        let host_name = display_name_from_profile(host_profile);

        self.lobbies.insert(
            id,
            LobbyRecord {
                id,
                name: name.clone(),
                password: password.filter(|p| !p.is_empty()),
                host: session,
                host_name: host_name.clone(),
                roster: BTreeMap::new(),
            },
        );
        info!(%session, lobby_id = %id, lobby = %name, host = %host_name, "lobby created");

        self.announcer.announce(Advert {
            lobby_name: name.clone(),
            host_name,
        });
        self.advertised = Some(id);

        out.send_to(
            session,
            &ServerMessage::LobbyCreated {
                lobby_id: id,
                lobby_name: name,
            },
        );
        id
    }

    /// Summaries of every lobby, ordered by ID.
    pub fn list_lobbies(&self) -> Vec<LobbySummary> {
        self.lobbies
            .values()
            .map(|lobby| lobby.summary(self.capacity))
            .collect()
    }

    /// Register a pending join and notify the host. Returns the new request
    /// ID, or `None` if nothing was created.
    pub fn join_request(
        &mut self,
        session: SessionId,
        lobby_id: Option<LobbyId>,
        player_name: String,
        out: &mut impl Outbox,
    ) -> Option<RequestId> {
        let lobby_id = match lobby_id {
            Some(id) => id,
            None => match self.sole_lobby() {
                Ok(id) => id,
                Err(reason) => {
                    warn!(%session, player = %player_name, "join request declined: {reason}");
                    decline(out, session, None, reason);
                    return None;
                }
            },
        };

        let capacity = self.capacity;
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            warn!(%session, %lobby_id, "join request for unknown lobby ignored");
            return None;
        };

        if lobby.host == session {
            decline(out, session, Some(lobby_id), "you are hosting this lobby".into());
            return None;
        }
        if lobby.roster.values().any(|entry| entry.session == session) {
            decline(
                out,
                session,
                Some(lobby_id),
                "already requested to join this lobby".into(),
            );
            return None;
        }
        if lobby.roster.len() >= capacity as usize {
            info!(%session, %lobby_id, "join request declined: lobby full");
            decline(out, session, Some(lobby_id), "lobby is full".into());
            return None;
        }

        let request_id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        lobby.roster.insert(
            request_id,
            PlayerEntry {
                request_id,
                name: player_name.clone(),
                session,
                status: EntryStatus::Pending,
            },
        );
        info!(%session, %lobby_id, %request_id, player = %player_name, "join request pending");

        let host = lobby.host;
        out.send_to(
            host,
            &ServerMessage::JoinRequest {
                lobby_id,
                request_id,
                player_name,
            },
        );
        Some(request_id)
    }

    /// Apply the host's decision on a pending request. Returns whether
    /// anything changed.
    pub fn join_decision(
        &mut self,
        session: SessionId,
        lobby_id: LobbyId,
        request_id: RequestId,
        accepted: bool,
        out: &mut impl Outbox,
    ) -> bool {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            warn!(%session, %lobby_id, "decision for unknown lobby ignored");
            return false;
        };
        if lobby.host != session {
            warn!(%session, %lobby_id, "decision from non-host session ignored");
            return false;
        }
        let Some(entry) = lobby.roster.get_mut(&request_id) else {
            warn!(%session, %lobby_id, %request_id, "decision for unknown request ignored");
            return false;
        };
        if entry.status != EntryStatus::Pending {
            debug!(%lobby_id, %request_id, "request already decided");
            return false;
        }

        let joiner = entry.session;
        let outcome = if accepted {
            entry.status = EntryStatus::Accepted;
            JoinOutcome::Accepted
        } else {
            lobby.roster.remove(&request_id);
            JoinOutcome::Declined
        };
        info!(%lobby_id, %request_id, ?outcome, "join decided");

        out.send_to(
            joiner,
            &ServerMessage::JoinResult {
                result: outcome,
                lobby_id: Some(lobby_id),
                reason: None,
            },
        );
        true
    }

    /// Forget a disconnected session: drop its roster entries and close the
    /// lobbies it hosted.
    pub fn session_closed(&mut self, session: SessionId, out: &mut impl Outbox) {
        for lobby in self.lobbies.values_mut() {
            let before = lobby.roster.len();
            lobby.roster.retain(|_, entry| entry.session != session);
            if lobby.roster.len() != before {
                debug!(%session, lobby_id = %lobby.id, "entries of departed session removed");
            }
        }

        let hosted: Vec<LobbyId> = self
            .lobbies
            .values()
            .filter(|lobby| lobby.host == session)
            .map(|lobby| lobby.id)
            .collect();
        for lobby_id in hosted {
            let Some(lobby) = self.lobbies.remove(&lobby_id) else {
                continue;
            };
            info!(%session, %lobby_id, "host left, lobby closed");
            for entry in lobby.roster.values() {
                out.send_to(entry.session, &ServerMessage::LobbyClosed { lobby_id });
            }
        }

        if self.advertised.is_some_and(|id| !self.lobbies.contains_key(&id)) {
            self.readvertise();
        }
    }

    /// Point the advert at the newest open lobby, or clear it.
    fn readvertise(&mut self) {
        match self.lobbies.values().next_back() {
            Some(lobby) => {
                debug!(lobby_id = %lobby.id, "advert moved to newest open lobby");
                self.advertised = Some(lobby.id);
                self.announcer.announce(Advert {
                    lobby_name: lobby.name.clone(),
                    host_name: lobby.host_name.clone(),
                });
            }
            None => {
                self.advertised = None;
                self.announcer.clear();
            }
        }
    }

    pub fn lobby(&self, id: LobbyId) -> Option<&LobbyRecord> {
        self.lobbies.get(&id)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// The lobby a join without an ID refers to, if that's unambiguous.
    fn sole_lobby(&self) -> Result<LobbyId, String> {
        let mut ids = self.lobbies.keys();
        match (ids.next(), ids.next()) {
            (Some(&id), None) => Ok(id),
            (None, _) => Err("no lobby is open on this server".into()),
            (Some(_), Some(_)) => Err(format!(
                "{} lobbies are open; a lobby id is required",
                self.lobbies.len()
            )),
        }
    }
}

fn decline(out: &mut impl Outbox, session: SessionId, lobby_id: Option<LobbyId>, reason: String) {
    out.send_to(
        session,
        &ServerMessage::JoinResult {
            result: JoinOutcome::Declined,
            lobby_id,
            reason: Some(reason),
        },
    );
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Outbox that records deliveries and can pretend some sessions left.
    #[derive(Default)]
    struct Recorder {
        sent: Vec<(SessionId, ServerMessage)>,
        gone: Vec<SessionId>,
    }

    impl Outbox for Recorder {
        fn send_to(&mut self, session: SessionId, msg: &ServerMessage) -> bool {
            if self.gone.contains(&session) {
                return false;
            }
            self.sent.push((session, msg.clone()));
            true
        }
    }

    impl Recorder {
        fn take(&mut self) -> Vec<(SessionId, ServerMessage)> {
            std::mem::take(&mut self.sent)
        }
    }

    const HOST: SessionId = SessionId(1);
    const GUEST: SessionId = SessionId(2);
    const OTHER: SessionId = SessionId(3);

    fn manager() -> (LobbyManager, Announcer) {
        let announcer = Announcer::new();
        (LobbyManager::new(4, announcer.clone()), announcer)
    }

    fn create(
        manager: &mut LobbyManager,
        out: &mut Recorder,
        host: SessionId,
        name: &str,
    ) -> LobbyId {
        let id = manager.create_lobby(
            host,
            name.into(),
            Some("pw".into()),
            &json!({"name": "Marla"}),
            out,
        );
        out.take();
        id
    }

    #[test]
    fn create_then_list() {
        let (mut manager, announcer) = manager();
        let mut out = Recorder::default();
        let id = manager.create_lobby(
            HOST,
            "Alpha".into(),
            Some("pw".into()),
            &json!(["local-id", "Marla"]),
            &mut out,
        );

        assert_eq!(
            out.take(),
            vec![(
                HOST,
                ServerMessage::LobbyCreated {
                    lobby_id: id,
                    lobby_name: "Alpha".into(),
                }
            )]
        );
        let lobbies = manager.list_lobbies();
        assert_eq!(lobbies.len(), 1);
        assert_eq!(lobbies[0].name, "Alpha");
        assert_eq!(lobbies[0].occupancy, 0);
        assert_eq!(lobbies[0].capacity, 4);
        assert!(lobbies[0].has_password);
        assert_eq!(
            announcer.current(),
            Some(Advert {
                lobby_name: "Alpha".into(),
                host_name: "Marla".into(),
            })
        );
    }

    #[test]
    fn get_lobbies_replies_to_sender_only() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        create(&mut manager, &mut out, HOST, "Alpha");

        manager.handle(GUEST, ClientMessage::GetLobbies {}, &mut out);
        let sent = out.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, GUEST);
        assert!(matches!(&sent[0].1, ServerMessage::LobbyList(list) if list.len() == 1));
    }

    #[test]
    fn lobby_ids_are_unique_and_never_reused() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let a = create(&mut manager, &mut out, HOST, "A");
        let b = create(&mut manager, &mut out, GUEST, "B");
        assert_ne!(a, b);
        manager.session_closed(HOST, &mut out);
        let c = create(&mut manager, &mut out, OTHER, "C");
        assert!(c != a && c != b);
    }

    #[test]
    fn join_without_id_resolves_to_sole_lobby() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");

        let request_id = manager
            .join_request(GUEST, None, "Guest".into(), &mut out)
            .unwrap();

        assert_eq!(
            out.take(),
            vec![(
                HOST,
                ServerMessage::JoinRequest {
                    lobby_id,
                    request_id,
                    player_name: "Guest".into(),
                }
            )]
        );
        let entry = manager.lobby(lobby_id).unwrap().entry(request_id).unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.session, GUEST);
        assert_eq!(manager.list_lobbies()[0].occupancy, 1);
    }

    #[test]
    fn join_without_id_is_declined_when_ambiguous() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();

        assert_eq!(manager.join_request(GUEST, None, "Guest".into(), &mut out), None);
        let sent = out.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, GUEST);
        assert!(matches!(
            &sent[0].1,
            ServerMessage::JoinResult {
                result: JoinOutcome::Declined,
                lobby_id: None,
                reason: Some(_),
            }
        ));

        create(&mut manager, &mut out, HOST, "A");
        create(&mut manager, &mut out, OTHER, "B");
        assert_eq!(manager.join_request(GUEST, None, "Guest".into(), &mut out), None);
        let sent = out.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, GUEST, "host must not be bothered");
        assert!(manager.list_lobbies().iter().all(|l| l.occupancy == 0));
    }

    #[test]
    fn join_with_unknown_id_is_silent() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        create(&mut manager, &mut out, HOST, "Alpha");
        assert_eq!(
            manager.join_request(GUEST, Some(LobbyId(999)), "Guest".into(), &mut out),
            None
        );
        assert!(out.take().is_empty());
    }

    #[test]
    fn accept_sends_exactly_one_accepted_result() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");
        let request_id = manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .unwrap();
        out.take();

        assert!(manager.join_decision(HOST, lobby_id, request_id, true, &mut out));
        assert_eq!(
            out.take(),
            vec![(
                GUEST,
                ServerMessage::JoinResult {
                    result: JoinOutcome::Accepted,
                    lobby_id: Some(lobby_id),
                    reason: None,
                }
            )]
        );
        let entry = manager.lobby(lobby_id).unwrap().entry(request_id).unwrap();
        assert_eq!(entry.status, EntryStatus::Accepted);

        // Deciding again changes nothing and sends nothing.
        assert!(!manager.join_decision(HOST, lobby_id, request_id, false, &mut out));
        assert!(out.take().is_empty());
        assert_eq!(manager.lobby(lobby_id).unwrap().occupancy(), 1);
    }

    #[test]
    fn decline_removes_entry_and_sends_one_declined_result() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");
        let request_id = manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .unwrap();
        out.take();

        assert!(manager.join_decision(HOST, lobby_id, request_id, false, &mut out));
        assert_eq!(
            out.take(),
            vec![(
                GUEST,
                ServerMessage::JoinResult {
                    result: JoinOutcome::Declined,
                    lobby_id: Some(lobby_id),
                    reason: None,
                }
            )]
        );
        assert!(manager.lobby(lobby_id).unwrap().entry(request_id).is_none());
        assert_eq!(manager.list_lobbies()[0].occupancy, 0);
    }

    #[test]
    fn unknown_or_unauthorized_decisions_change_nothing() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");
        let request_id = manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .unwrap();
        out.take();

        assert!(!manager.join_decision(HOST, lobby_id, RequestId(999), true, &mut out));
        assert!(!manager.join_decision(HOST, LobbyId(999), request_id, true, &mut out));
        assert!(!manager.join_decision(OTHER, lobby_id, request_id, true, &mut out));
        assert!(out.take().is_empty());
        let entry = manager.lobby(lobby_id).unwrap().entry(request_id).unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
    }

    #[test]
    fn decision_after_joiner_left_is_a_no_op() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");
        let request_id = manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .unwrap();
        out.take();

        out.gone.push(GUEST);
        manager.session_closed(GUEST, &mut out);
        assert!(!manager.join_decision(HOST, lobby_id, request_id, true, &mut out));
        assert!(out.take().is_empty());
        assert_eq!(manager.lobby(lobby_id).unwrap().occupancy(), 0);
    }

    #[test]
    fn host_leaving_closes_lobby_and_clears_advert() {
        let (mut manager, announcer) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");
        manager.join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out);
        manager.join_request(OTHER, Some(lobby_id), "Other".into(), &mut out);
        out.take();

        manager.session_closed(HOST, &mut out);
        let sent = out.take();
        assert_eq!(
            sent,
            vec![
                (GUEST, ServerMessage::LobbyClosed { lobby_id }),
                (OTHER, ServerMessage::LobbyClosed { lobby_id }),
            ]
        );
        assert_eq!(manager.lobby_count(), 0);
        assert_eq!(announcer.current(), None);
    }

    #[test]
    fn closing_an_older_lobby_keeps_newer_advert() {
        let (mut manager, announcer) = manager();
        let mut out = Recorder::default();
        create(&mut manager, &mut out, HOST, "Old");
        create(&mut manager, &mut out, OTHER, "New");
        manager.session_closed(HOST, &mut out);
        assert_eq!(announcer.current().unwrap().lobby_name, "New");
    }

    #[test]
    fn closing_the_advertised_lobby_advertises_the_newest_survivor() {
        let (mut manager, announcer) = manager();
        let mut out = Recorder::default();
        create(&mut manager, &mut out, HOST, "First");
        create(&mut manager, &mut out, OTHER, "Second");
        create(&mut manager, &mut out, GUEST, "Third");

        manager.session_closed(GUEST, &mut out);
        assert_eq!(
            announcer.current(),
            Some(Advert {
                lobby_name: "Second".into(),
                host_name: "Marla".into(),
            })
        );

        manager.session_closed(OTHER, &mut out);
        assert_eq!(announcer.current().unwrap().lobby_name, "First");

        manager.session_closed(HOST, &mut out);
        assert_eq!(announcer.current(), None);
    }

    #[test]
    fn capacity_counts_pending_entries() {
        let announcer = Announcer::new();
        let mut manager = LobbyManager::new(1, announcer);
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Tiny");

        assert!(manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .is_some());
        out.take();
        assert!(manager
            .join_request(OTHER, Some(lobby_id), "Other".into(), &mut out)
            .is_none());
        assert!(matches!(
            &out.take()[..],
            [(s, ServerMessage::JoinResult { result: JoinOutcome::Declined, .. })] if *s == OTHER
        ));
    }

    #[test]
    fn host_and_duplicate_requests_are_declined() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let lobby_id = create(&mut manager, &mut out, HOST, "Alpha");

        assert!(manager
            .join_request(HOST, Some(lobby_id), "Me".into(), &mut out)
            .is_none());
        assert!(manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .is_some());
        assert!(manager
            .join_request(GUEST, Some(lobby_id), "Guest".into(), &mut out)
            .is_none());
        assert_eq!(manager.lobby(lobby_id).unwrap().occupancy(), 1);
    }

    #[test]
    fn rosters_of_separate_lobbies_stay_disjoint() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let a = create(&mut manager, &mut out, HOST, "A");
        let b = create(&mut manager, &mut out, OTHER, "B");
        let req = manager
            .join_request(GUEST, Some(a), "Guest".into(), &mut out)
            .unwrap();

        assert!(manager.lobby(a).unwrap().entry(req).is_some());
        assert_eq!(manager.lobby(b).unwrap().occupancy(), 0);
        // The other lobby's host cannot decide on lobby A's request.
        assert!(!manager.join_decision(OTHER, a, req, true, &mut out));
    }

    #[test]
    fn empty_password_counts_as_none() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        let id = manager.create_lobby(
            HOST,
            "Open".into(),
            Some(String::new()),
            &Value::Null,
            &mut out,
        );
        assert_eq!(manager.lobby(id).unwrap().password, None);
        assert_eq!(manager.lobby(id).unwrap().host_name, "Host");
        assert!(!manager.list_lobbies()[0].has_password);
    }

    #[test]
    fn move_is_accepted_and_ignored() {
        let (mut manager, _) = manager();
        let mut out = Recorder::default();
        manager.handle(GUEST, ClientMessage::Move(json!({"direction": "up"})), &mut out);
        assert!(out.take().is_empty());
        assert_eq!(manager.lobby_count(), 0);
    }
}
