use std::collections::{BTreeSet, HashMap};

use crate::models::Cliente;

/// Selected customer ids plus the record each one had when it was selected.
/// The cache is what keeps a selection meaningful after a new search replaces
/// the visible list: the set says who is selected, the cache remembers what
/// was known about them at selection time.
#[derive(Debug, Default)]
pub struct SelectionStore {
    ids: BTreeSet<i64>,
    cache: HashMap<i64, Cliente>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the selection state of `id`. When selecting, the record is
    /// copied out of the currently displayed list if it is there; selecting
    /// an id that is not visible keeps the id but leaves the cache empty
    /// until a displayed record for it is seen again.
    pub fn toggle(&mut self, id: i64, displayed: &[Cliente]) {
        if self.ids.remove(&id) {
            self.cache.remove(&id);
            return;
        }

        self.ids.insert(id);
        if let Some(cliente) = displayed.iter().find(|c| c.id == id) {
            self.cache.insert(id, cliente.clone());
        }
    }

    pub fn remove(&mut self, id: i64) {
        self.ids.remove(&id);
        self.cache.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.cache.clear();
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Cached records for the current selection, in id order. Ids whose
    /// record was never seen are skipped rather than reported as an error.
    pub fn snapshot(&self) -> Vec<Cliente> {
        self.ids
            .iter()
            .filter_map(|id| self.cache.get(id).cloned())
            .collect()
    }

    /// First selected id with a cached record; the preview representative.
    pub fn first_id(&self) -> Option<i64> {
        self.ids.iter().find(|id| self.cache.contains_key(id)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cliente(id: i64, nome: &str) -> Cliente {
        Cliente {
            id,
            nome: nome.to_string(),
            telefone: None,
            email: None,
            status: None,
        }
    }

    #[test]
    fn toggle_alterna_como_conjunto() {
        let lista = vec![cliente(1, "Ana"), cliente(2, "Bruno"), cliente(3, "Carla")];
        let mut selecao = SelectionStore::new();

        selecao.toggle(1, &lista);
        selecao.toggle(2, &lista);
        selecao.toggle(1, &lista);
        selecao.toggle(3, &lista);
        selecao.toggle(3, &lista);
        selecao.toggle(3, &lista);

        // 1 toggled twice, 2 once, 3 three times.
        assert_eq!(selecao.count(), 2);
        assert!(!selecao.contains(1));
        assert!(selecao.contains(2));
        assert!(selecao.contains(3));
    }

    #[test]
    fn snapshot_sobrevive_a_troca_da_lista_exibida() {
        let lista = vec![cliente(1, "Ana")];
        let mut selecao = SelectionStore::new();
        selecao.toggle(1, &lista);

        // Nova busca substitui a lista exibida por completo.
        let lista_vazia: Vec<Cliente> = Vec::new();
        let _ = &lista_vazia;

        let registros = selecao.snapshot();
        assert_eq!(registros.len(), 1);
        assert_eq!(registros[0].nome, "Ana");
    }

    #[test]
    fn toggle_de_id_fora_da_lista_seleciona_sem_cache() {
        let mut selecao = SelectionStore::new();
        selecao.toggle(42, &[]);

        assert_eq!(selecao.count(), 1);
        assert!(selecao.contains(42));
        // Sem registro visto, o id fica fora do snapshot.
        assert!(selecao.snapshot().is_empty());
        assert!(selecao.first_id().is_none());
    }

    #[test]
    fn reselecionar_com_registro_visivel_preenche_o_cache() {
        let mut selecao = SelectionStore::new();
        selecao.toggle(5, &[]);
        selecao.toggle(5, &[]);
        selecao.toggle(5, &[cliente(5, "Elisa")]);

        let registros = selecao.snapshot();
        assert_eq!(registros.len(), 1);
        assert_eq!(registros[0].nome, "Elisa");
        assert_eq!(selecao.first_id(), Some(5));
    }

    #[test]
    fn remove_do_ultimo_id_esvazia_a_selecao() {
        let lista = vec![cliente(9, "Igor")];
        let mut selecao = SelectionStore::new();
        selecao.toggle(9, &lista);

        selecao.remove(9);
        assert!(selecao.is_empty());
        assert!(selecao.snapshot().is_empty());
    }

    #[test]
    fn clear_esvazia_conjunto_e_cache() {
        let lista = vec![cliente(1, "Ana"), cliente(2, "Bruno")];
        let mut selecao = SelectionStore::new();
        selecao.toggle(1, &lista);
        selecao.toggle(2, &lista);

        selecao.clear();
        assert_eq!(selecao.count(), 0);
        assert!(selecao.snapshot().is_empty());
    }

    #[test]
    fn snapshot_em_ordem_de_id() {
        let lista = vec![cliente(3, "Carla"), cliente(1, "Ana"), cliente(2, "Bruno")];
        let mut selecao = SelectionStore::new();
        selecao.toggle(3, &lista);
        selecao.toggle(1, &lista);
        selecao.toggle(2, &lista);

        let nomes: Vec<_> = selecao.snapshot().into_iter().map(|c| c.nome).collect();
        assert_eq!(nomes, vec!["Ana", "Bruno", "Carla"]);
        assert_eq!(selecao.first_id(), Some(1));
    }
}
