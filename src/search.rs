use std::time::{Duration, Instant};

/// Minimum typed length before a search is worth sending.
pub const MIN_TERM_LEN: usize = 2;

/// Debounce and stale-response bookkeeping for the customer search box.
///
/// Keystrokes re-arm a single deadline (last keystroke wins). When the
/// deadline passes, the term is compared against the last successfully
/// fetched one so identical consecutive searches skip the network. Each
/// dispatched query carries a sequence number; only the response matching
/// the newest dispatched sequence is applied, so an out-of-order completion
/// can never overwrite fresher results.
#[derive(Debug)]
pub struct SearchCoordinator {
    debounce: Duration,
    deadline: Option<Instant>,
    next_seq: u64,
    in_flight: Option<u64>,
    last_fetched: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Term too short: displayed list must be cleared, nothing scheduled.
    Clear,
    /// Deadline (re)armed; poll until it fires.
    Scheduled,
}

impl SearchCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            next_seq: 0,
            in_flight: None,
            last_fetched: None,
        }
    }

    /// Handles a text change. Shrinking below the minimum cancels pending
    /// work and invalidates any in-flight query so its late response is
    /// dropped instead of repopulating a list the operator just cleared.
    pub fn on_input(&mut self, term: &str, now: Instant) -> InputAction {
        if term.trim().chars().count() < MIN_TERM_LEN {
            self.deadline = None;
            self.in_flight = None;
            return InputAction::Clear;
        }

        self.deadline = Some(now + self.debounce);
        InputAction::Scheduled
    }

    /// Fires the deadline if due. Returns the sequence number and term to
    /// dispatch, or `None` when there is nothing to do (not due yet, or the
    /// term already matches the last completed fetch).
    pub fn poll(&mut self, term: &str, now: Instant) -> Option<(u64, String)> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;

        let term = term.trim().to_string();
        if self.last_fetched.as_deref() == Some(term.as_str()) {
            return None;
        }

        self.next_seq += 1;
        self.in_flight = Some(self.next_seq);
        Some((self.next_seq, term))
    }

    /// Immediately claims a sequence number for a query that bypasses the
    /// debounce (the unfiltered "load all" action). Cancels anything
    /// pending so the two query kinds share one ordering.
    pub fn dispatch_now(&mut self) -> u64 {
        self.deadline = None;
        self.next_seq += 1;
        self.in_flight = Some(self.next_seq);
        self.next_seq
    }

    /// True when `seq` is the query whose result should be applied.
    pub fn accept_response(&mut self, seq: u64) -> bool {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
            return true;
        }
        false
    }

    /// Records a completed fetch so the same term is not re-queried. Not
    /// called on failure: a retry of the same term must hit the network.
    pub fn mark_fetched(&mut self, term: &str) {
        self.last_fetched = Some(term.to_string());
    }

    /// Forgets the last fetched term, e.g. after the unfiltered list
    /// replaced the search results.
    pub fn invalidate(&mut self) {
        self.last_fetched = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> SearchCoordinator {
        SearchCoordinator::new(Duration::from_millis(400))
    }

    fn after_debounce(now: Instant) -> Instant {
        now + Duration::from_millis(401)
    }

    #[test]
    fn termo_curto_limpa_e_cancela() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        assert_eq!(busca.on_input("ana", t0), InputAction::Scheduled);
        assert_eq!(busca.on_input("a", t0), InputAction::Clear);
        // Nada agendado; nenhum envio mesmo muito depois.
        assert_eq!(busca.poll("a", after_debounce(t0)), None);
        assert!(busca.deadline().is_none());
    }

    #[test]
    fn ultima_tecla_vence() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("an", t0);
        let t1 = t0 + Duration::from_millis(200);
        busca.on_input("ana", t1);

        // O primeiro prazo foi descartado pelo segundo.
        assert_eq!(busca.poll("ana", after_debounce(t0)), None);
        let (seq, termo) = busca.poll("ana", after_debounce(t1)).expect("despacho");
        assert_eq!(seq, 1);
        assert_eq!(termo, "ana");
    }

    #[test]
    fn termo_repetido_nao_reenvia() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("an", t0);
        let (seq, termo) = busca.poll("an", after_debounce(t0)).expect("primeiro");
        assert!(busca.accept_response(seq));
        busca.mark_fetched(&termo);

        busca.on_input("ana", t0);
        let (seq, termo) = busca.poll("ana", after_debounce(t0)).expect("segundo");
        assert!(busca.accept_response(seq));
        busca.mark_fetched(&termo);

        // Mesmo termo digitado de novo: prazo arma, mas nada é enviado.
        busca.on_input("ana", t0);
        assert_eq!(busca.poll("ana", after_debounce(t0)), None);
        assert_eq!(seq, 2);
    }

    #[test]
    fn falha_nao_registra_termo() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("ana", t0);
        let (seq, _) = busca.poll("ana", after_debounce(t0)).expect("despacho");
        assert!(busca.accept_response(seq));
        // Fetch falhou: mark_fetched não é chamado.

        busca.on_input("ana", t0);
        assert!(busca.poll("ana", after_debounce(t0)).is_some());
    }

    #[test]
    fn resposta_atrasada_e_descartada() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("ana", t0);
        let (seq1, _) = busca.poll("ana", after_debounce(t0)).expect("primeiro");

        busca.on_input("anab", t0);
        let (seq2, _) = busca.poll("anab", after_debounce(t0)).expect("segundo");

        assert!(!busca.accept_response(seq1));
        assert!(busca.accept_response(seq2));
        assert_ne!(seq1, seq2);
    }

    #[test]
    fn encolher_entrada_descarta_resposta_em_voo() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("ana", t0);
        let (seq, _) = busca.poll("ana", after_debounce(t0)).expect("despacho");
        assert!(busca.is_fetching());

        busca.on_input("a", t0);
        assert!(!busca.is_fetching());
        assert!(!busca.accept_response(seq));
    }

    #[test]
    fn carregar_tudo_supera_busca_pendente() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("ana", t0);
        let (seq_busca, _) = busca.poll("ana", after_debounce(t0)).expect("despacho");

        let seq_lista = busca.dispatch_now();
        assert!(!busca.accept_response(seq_busca));
        assert!(busca.accept_response(seq_lista));
    }

    #[test]
    fn invalidate_permite_rebuscar_o_mesmo_termo() {
        let mut busca = coordinator();
        let t0 = Instant::now();

        busca.on_input("ana", t0);
        let (seq, termo) = busca.poll("ana", after_debounce(t0)).expect("despacho");
        assert!(busca.accept_response(seq));
        busca.mark_fetched(&termo);

        busca.invalidate();
        busca.on_input("ana", t0);
        assert!(busca.poll("ana", after_debounce(t0)).is_some());
    }
}
