use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use eframe::App;
use egui::{Color32, RichText, TextEdit};

use crate::api::ApiClient;
use crate::config::Config;
use crate::models::{
    Atividade, BatchSendRequest, BatchSendResponse, DashboardStats, PreviewRequest,
    PreviewResponse, Template, TemplateCreate, TemplateUpdate, TipoCobranca,
};
use crate::search::{InputAction, MIN_TERM_LEN, SearchCoordinator};
use crate::selection::SelectionStore;
use crate::workers::{
    ApiTask, ApiTaskResult, ClienteQuery, ClienteQueryResult, spawn_cliente_worker,
    spawn_task_worker,
};

/// Delay before a fully successful dispatch wipes the form, so the operator
/// can read the per-customer outcomes first.
const LIMPAR_APOS_SUCESSO: Duration = Duration::from_secs(3);

const VERDE: Color32 = Color32::from_rgb(46, 125, 50);
const VERMELHO: Color32 = Color32::from_rgb(183, 28, 28);
const LARANJA: Color32 = Color32::from_rgb(230, 126, 34);
const AZUL: Color32 = Color32::from_rgb(41, 128, 185);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Envio,
    Templates,
    Dashboard,
}

struct StatusLine {
    texto: String,
    erro: bool,
    desde: Instant,
}

/// Everything the operator types into the Envio tab besides the search box.
#[derive(Debug, Clone)]
pub struct FormEnvio {
    pub tipo: TipoCobranca,
    pub mensagem: String,
    /// Chosen template name; empty means free-text message.
    pub template: String,
    pub valor: String,
    pub dia_vencimento: String,
    pub data_vencimento: String,
    pub descricao: String,
}

impl Default for FormEnvio {
    fn default() -> Self {
        Self {
            tipo: TipoCobranca::Financeira,
            mensagem: String::new(),
            template: String::new(),
            valor: String::new(),
            dia_vencimento: String::new(),
            data_vencimento: String::new(),
            descricao: String::new(),
        }
    }
}

impl FormEnvio {
    fn limpar(&mut self) {
        let tipo = self.tipo;
        *self = Self::default();
        self.tipo = tipo;
    }

    /// The four supported extra variables, trimmed; empty ones are left out
    /// of the request entirely.
    pub fn variaveis_extras(&self) -> BTreeMap<String, String> {
        let campos = [
            ("valor", &self.valor),
            ("dia_vencimento", &self.dia_vencimento),
            ("data_vencimento", &self.data_vencimento),
            ("descricao", &self.descricao),
        ];

        campos
            .into_iter()
            .filter_map(|(chave, campo)| {
                let texto = campo.trim();
                (!texto.is_empty()).then(|| (chave.to_string(), texto.to_string()))
            })
            .collect()
    }
}

/// Builds the batch request or reports the validation error that blocks it.
/// No network effect happens until this succeeds AND the operator confirms.
pub fn montar_envio(ids: Vec<i64>, form: &FormEnvio) -> Result<BatchSendRequest, String> {
    if ids.is_empty() {
        return Err("Selecione pelo menos um cliente".to_string());
    }

    let template = form.template.trim();
    let mensagem = form.mensagem.trim();
    if template.is_empty() && mensagem.is_empty() {
        return Err("Digite uma mensagem ou selecione um template".to_string());
    }

    // Template escolhido suprime a mensagem livre.
    let (template_name, mensagem_padrao) = if template.is_empty() {
        (None, Some(mensagem.to_string()))
    } else {
        (Some(template.to_string()), None)
    };

    Ok(BatchSendRequest {
        clientes_ids: ids,
        tipo: form.tipo,
        mensagem_padrao,
        template_name,
        variaveis_extras: form.variaveis_extras(),
        mensagens_customizadas: BTreeMap::new(),
        enviar_agora: true,
    })
}

/// Full success clears selection and form; any failure leaves them intact
/// for an operator-initiated retry.
pub fn envio_limpa_formulario(resposta: &BatchSendResponse) -> bool {
    resposta.erros == 0
}

struct TemplateEditor {
    /// Name of the template being edited; `None` when creating a new one.
    original: Option<String>,
    nome: String,
    texto: String,
    variaveis: String,
    ativo: bool,
    salvando: bool,
}

impl TemplateEditor {
    fn novo() -> Self {
        Self {
            original: None,
            nome: String::new(),
            texto: String::new(),
            variaveis: String::new(),
            ativo: true,
            salvando: false,
        }
    }

    fn de(template: &Template) -> Self {
        Self {
            original: Some(template.nome.clone()),
            nome: template.nome.clone(),
            texto: template.template_text.clone(),
            variaveis: template.variaveis.clone().unwrap_or_default(),
            ativo: template.ativo,
            salvando: false,
        }
    }
}

pub struct DeskApp {
    config: Config,
    tab: Tab,

    // Busca e lista de clientes.
    busca: String,
    clientes: Vec<crate::models::Cliente>,
    busca_atual: Option<String>,
    carregou_clientes: bool,
    search: SearchCoordinator,
    erro_busca: Option<String>,
    selecao: SelectionStore,

    // Composição e envio.
    form: FormEnvio,
    preview: Option<PreviewResponse>,
    aguardando_preview: bool,
    confirmando_envio: bool,
    enviando: bool,
    resultado: Option<BatchSendResponse>,
    erro_envio: Option<String>,
    limpar_em: Option<Instant>,

    // Templates.
    templates: Vec<Template>,
    erro_templates: Option<String>,
    carregando_templates: bool,
    editor: Option<TemplateEditor>,
    exclusao_pendente: Option<String>,

    // Dashboard.
    stats: Option<DashboardStats>,
    erro_stats: Option<String>,
    atividades: Vec<Atividade>,
    erro_atividades: Option<String>,
    carregando_dashboard: bool,

    status: Option<StatusLine>,

    cliente_tx: Sender<ClienteQuery>,
    cliente_rx: Receiver<ClienteQueryResult>,
    task_tx: Sender<ApiTask>,
    task_rx: Receiver<ApiTaskResult>,
}

impl DeskApp {
    pub fn new(ctx: &egui::Context, config: Config, api: ApiClient) -> Self {
        let (cliente_tx, cliente_rx) = spawn_cliente_worker(api.clone(), ctx.clone());
        let (task_tx, task_rx) = spawn_task_worker(api, ctx.clone());

        let mut app = Self {
            search: SearchCoordinator::new(Duration::from_millis(config.search_debounce_ms)),
            config,
            tab: Tab::Envio,
            busca: String::new(),
            clientes: Vec::new(),
            busca_atual: None,
            carregou_clientes: false,
            erro_busca: None,
            selecao: SelectionStore::new(),
            form: FormEnvio::default(),
            preview: None,
            aguardando_preview: false,
            confirmando_envio: false,
            enviando: false,
            resultado: None,
            erro_envio: None,
            limpar_em: None,
            templates: Vec::new(),
            erro_templates: None,
            carregando_templates: false,
            editor: None,
            exclusao_pendente: None,
            stats: None,
            erro_stats: None,
            atividades: Vec::new(),
            erro_atividades: None,
            carregando_dashboard: false,
            status: None,
            cliente_tx,
            cliente_rx,
            task_tx,
            task_rx,
        };

        // Mesma carga inicial do painel web: templates e dashboard.
        app.carregar_templates();
        app.carregar_dashboard();
        app
    }

    fn status_ok(&mut self, texto: impl Into<String>) {
        self.status = Some(StatusLine {
            texto: texto.into(),
            erro: false,
            desde: Instant::now(),
        });
    }

    fn status_erro(&mut self, texto: impl Into<String>) {
        self.status = Some(StatusLine {
            texto: texto.into(),
            erro: true,
            desde: Instant::now(),
        });
    }

    fn expire_status(&mut self, ctx: &egui::Context) {
        let duracao = Duration::from_millis(self.config.status_duration_ms);
        if let Some(status) = &self.status {
            let idade = status.desde.elapsed();
            if idade >= duracao {
                self.status = None;
            } else {
                ctx.request_repaint_after(duracao - idade);
            }
        }
    }

    fn enviar_task(&mut self, task: ApiTask) -> bool {
        if self.task_tx.send(task).is_err() {
            self.status_erro("Falha interna: worker de API indisponível");
            return false;
        }
        true
    }

    // ----- clientes -----

    fn carregar_clientes(&mut self) {
        let seq = self.search.dispatch_now();
        self.erro_busca = None;
        let query = ClienteQuery {
            seq,
            termo: None,
            limit: self.config.cliente_limit,
        };
        if self.cliente_tx.send(query).is_err() {
            self.status_erro("Falha interna: worker de clientes indisponível");
        }
    }

    fn on_busca_alterada(&mut self) {
        match self.search.on_input(&self.busca, Instant::now()) {
            InputAction::Clear => {
                self.clientes.clear();
                self.busca_atual = None;
                self.carregou_clientes = false;
                self.erro_busca = None;
            }
            InputAction::Scheduled => {}
        }
    }

    fn dispatch_due_search(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if let Some((seq, termo)) = self.search.poll(&self.busca, now) {
            self.erro_busca = None;
            let query = ClienteQuery {
                seq,
                termo: Some(termo),
                limit: self.config.cliente_limit,
            };
            if self.cliente_tx.send(query).is_err() {
                self.status_erro("Falha interna: worker de clientes indisponível");
            }
        } else if let Some(deadline) = self.search.deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }

    fn apply_cliente_results(&mut self) {
        loop {
            match self.cliente_rx.try_recv() {
                Ok(msg) => {
                    if !self.search.accept_response(msg.seq) {
                        continue;
                    }
                    match msg.result {
                        Ok(lista) => {
                            self.clientes = lista;
                            self.carregou_clientes = true;
                            self.erro_busca = None;
                            match msg.termo {
                                Some(termo) => {
                                    self.search.mark_fetched(&termo);
                                    self.busca_atual = Some(termo);
                                }
                                None => {
                                    self.search.invalidate();
                                    self.busca_atual = None;
                                }
                            }
                        }
                        Err(err) => {
                            self.erro_busca = Some(err.to_string());
                        }
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    // ----- envio -----

    fn pedir_preview(&mut self) {
        let template = self.form.template.trim().to_string();
        if template.is_empty() {
            self.status_erro("Selecione um template primeiro");
            return;
        }
        let Some(cliente_id) = self.selecao.first_id() else {
            self.status_erro("Selecione pelo menos um cliente para preview");
            return;
        };

        let request = PreviewRequest {
            template_name: template,
            cliente_id,
            variaveis_extras: self.form.variaveis_extras(),
        };
        if self.enviar_task(ApiTask::Preview(request)) {
            self.aguardando_preview = true;
        }
    }

    fn pedir_confirmacao_envio(&mut self) {
        let ids: Vec<i64> = self.selecao.snapshot().iter().map(|c| c.id).collect();
        match montar_envio(ids, &self.form) {
            Ok(_) => {
                self.confirmando_envio = true;
            }
            Err(motivo) => {
                self.status_erro(motivo);
            }
        }
    }

    fn confirmar_envio(&mut self) {
        self.confirmando_envio = false;
        let ids: Vec<i64> = self.selecao.snapshot().iter().map(|c| c.id).collect();
        match montar_envio(ids, &self.form) {
            Ok(request) => {
                self.resultado = None;
                self.erro_envio = None;
                if self.enviar_task(ApiTask::EnviarLote(request)) {
                    self.enviando = true;
                }
            }
            Err(motivo) => {
                self.status_erro(motivo);
            }
        }
    }

    fn limpar_formulario(&mut self) {
        self.selecao.clear();
        self.form.limpar();
        self.preview = None;
        self.resultado = None;
        self.erro_envio = None;
        self.confirmando_envio = false;
    }

    fn tick_limpeza(&mut self, ctx: &egui::Context) {
        let Some(at) = self.limpar_em else {
            return;
        };
        let now = Instant::now();
        if now >= at {
            self.limpar_em = None;
            self.limpar_formulario();
        } else {
            ctx.request_repaint_after(at - now);
        }
    }

    // ----- templates -----

    fn carregar_templates(&mut self) {
        if self.enviar_task(ApiTask::CarregarTemplates) {
            self.carregando_templates = true;
        }
    }

    fn salvar_editor(&mut self) {
        let (original, nome, texto, variaveis, ativo) = match &self.editor {
            Some(editor) if !editor.salvando => (
                editor.original.clone(),
                editor.nome.trim().to_string(),
                editor.texto.trim().to_string(),
                editor.variaveis.trim().to_string(),
                editor.ativo,
            ),
            _ => return,
        };

        if nome.is_empty() {
            self.status_erro("O template precisa de um nome");
            return;
        }
        if texto.is_empty() {
            self.status_erro("O template precisa de um texto");
            return;
        }

        let variaveis = (!variaveis.is_empty()).then_some(variaveis);

        let task = match original {
            None => ApiTask::CriarTemplate(TemplateCreate {
                nome,
                template_text: texto,
                variaveis,
            }),
            Some(original) => ApiTask::AtualizarTemplate {
                nome: original,
                update: TemplateUpdate {
                    template_text: Some(texto),
                    variaveis,
                    ativo: Some(ativo),
                },
            },
        };

        if self.enviar_task(task) {
            if let Some(editor) = self.editor.as_mut() {
                editor.salvando = true;
            }
        }
    }

    fn excluir_template(&mut self, nome: String) {
        self.exclusao_pendente = None;
        self.enviar_task(ApiTask::ExcluirTemplate { nome });
    }

    fn templates_ativos(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(|t| t.ativo)
    }

    // ----- dashboard -----

    fn carregar_dashboard(&mut self) {
        let atividades_limit = self.config.atividades_limit;
        if self.enviar_task(ApiTask::CarregarDashboard { atividades_limit }) {
            self.carregando_dashboard = true;
        }
    }

    fn apply_task_results(&mut self) {
        loop {
            let msg = match self.task_rx.try_recv() {
                Ok(msg) => msg,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            match msg {
                ApiTaskResult::Preview(result) => {
                    self.aguardando_preview = false;
                    match result {
                        Ok(preview) => {
                            self.preview = Some(preview);
                        }
                        Err(err) => {
                            self.status_erro(format!("Erro ao gerar preview: {err}"));
                        }
                    }
                }
                ApiTaskResult::EnvioConcluido(result) => {
                    self.enviando = false;
                    match result {
                        Ok(resposta) => {
                            if envio_limpa_formulario(&resposta) {
                                self.status_ok(format!(
                                    "{} mensagem(ns) enviada(s)",
                                    resposta.enviados
                                ));
                                self.limpar_em = Some(Instant::now() + LIMPAR_APOS_SUCESSO);
                            } else {
                                self.status_erro(format!(
                                    "{} envio(s) falharam; seleção mantida para reenvio",
                                    resposta.erros
                                ));
                            }
                            self.erro_envio = None;
                            self.resultado = Some(resposta);
                        }
                        Err(err) => {
                            self.erro_envio = Some(err.to_string());
                        }
                    }
                }
                ApiTaskResult::Templates(result) => {
                    self.carregando_templates = false;
                    match result {
                        Ok(lista) => {
                            // Um template escolhido que deixou de existir ou
                            // foi desativado sai do formulário.
                            let escolhido = self.form.template.trim();
                            if !escolhido.is_empty()
                                && !lista.iter().any(|t| t.ativo && t.nome == escolhido)
                            {
                                self.form.template.clear();
                            }
                            self.templates = lista;
                            self.erro_templates = None;
                        }
                        Err(err) => {
                            self.erro_templates = Some(err.to_string());
                        }
                    }
                }
                ApiTaskResult::TemplateCarregado(result) => match result {
                    Ok(template) => {
                        self.editor = Some(TemplateEditor::de(&template));
                    }
                    Err(err) if err.is_not_found() => {
                        self.status_erro(format!("{err}; a lista será atualizada"));
                        self.carregar_templates();
                    }
                    Err(err) => {
                        self.status_erro(format!("Erro ao abrir template: {err}"));
                    }
                },
                ApiTaskResult::TemplateSalvo(result) => {
                    if let Some(editor) = self.editor.as_mut() {
                        editor.salvando = false;
                    }
                    match result {
                        Ok(template) => {
                            self.status_ok(format!("Template '{}' salvo", template.nome));
                            self.editor = None;
                            self.carregar_templates();
                        }
                        Err(err) if err.is_not_found() => {
                            self.status_erro(format!("{err}; a lista será atualizada"));
                            self.editor = None;
                            self.carregar_templates();
                        }
                        Err(err) => {
                            self.status_erro(format!("Erro ao salvar template: {err}"));
                        }
                    }
                }
                ApiTaskResult::TemplateExcluido { nome, result } => match result {
                    Ok(()) => {
                        self.status_ok(format!("Template '{nome}' excluído"));
                        if self.form.template.trim() == nome {
                            self.form.template.clear();
                        }
                        self.carregar_templates();
                    }
                    Err(err) if err.is_not_found() => {
                        self.status_erro(format!("{err}; a lista será atualizada"));
                        self.carregar_templates();
                    }
                    Err(err) => {
                        self.status_erro(format!("Erro ao excluir template: {err}"));
                    }
                },
                ApiTaskResult::Dashboard { stats, atividades } => {
                    self.carregando_dashboard = false;
                    match stats {
                        Ok(stats) => {
                            self.stats = Some(stats);
                            self.erro_stats = None;
                        }
                        Err(err) => {
                            self.erro_stats = Some(err.to_string());
                        }
                    }
                    match atividades {
                        Ok(resposta) => {
                            self.atividades = resposta.atividades;
                            self.erro_atividades = None;
                        }
                        Err(err) => {
                            self.erro_atividades = Some(err.to_string());
                        }
                    }
                }
            }
        }
    }

    // ----- UI -----

    fn ui_topo(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label(
                RichText::new("Cobranca Desk")
                    .size(22.0)
                    .strong()
                    .color(Color32::from_gray(25)),
            );
            ui.add_space(24.0);

            let anterior = self.tab;
            ui.selectable_value(&mut self.tab, Tab::Envio, "Envio");
            ui.selectable_value(&mut self.tab, Tab::Templates, "Templates");
            ui.selectable_value(&mut self.tab, Tab::Dashboard, "Dashboard");
            if self.tab != anterior {
                match self.tab {
                    Tab::Envio => {}
                    Tab::Templates => self.carregar_templates(),
                    Tab::Dashboard => self.carregar_dashboard(),
                }
            }
        });

        if let Some(status) = &self.status {
            let cor = if status.erro { VERMELHO } else { VERDE };
            ui.colored_label(cor, &status.texto);
        }
        ui.add_space(4.0);
        ui.separator();
    }

    fn ui_envio(&mut self, ui: &mut egui::Ui) {
        ui.columns(2, |colunas| {
            let mut alternar: Option<i64> = None;
            let mut remover: Option<i64> = None;
            let mut recarregar = false;
            let mut busca_mudou = false;

            colunas[0].vertical(|ui| {
                ui.heading("Clientes");
                ui.horizontal(|ui| {
                    let response = ui.add(
                        TextEdit::singleline(&mut self.busca)
                            .hint_text("Buscar por nome...")
                            .desired_width(220.0),
                    );
                    if response.changed() {
                        busca_mudou = true;
                    }
                    if ui.button("Carregar todos").clicked() {
                        recarregar = true;
                    }
                });

                if let Some(err) = &self.erro_busca {
                    ui.colored_label(VERMELHO, format!("Erro ao buscar: {err}"));
                }

                if self.carregou_clientes {
                    let rotulo = match &self.busca_atual {
                        Some(termo) => {
                            format!("{} resultado(s) para \"{termo}\"", self.clientes.len())
                        }
                        None => format!("{} cliente(s)", self.clientes.len()),
                    };
                    ui.label(RichText::new(rotulo).size(12.0).color(Color32::from_gray(110)));
                }

                if self.clientes.is_empty() {
                    if self.search.is_fetching() {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Buscando...");
                        });
                    } else if self.busca.trim().chars().count() < MIN_TERM_LEN {
                        ui.label(
                            RichText::new(
                                "Digite ao menos 2 caracteres ou carregue a lista completa",
                            )
                            .italics()
                            .color(Color32::from_gray(110)),
                        );
                    } else if self.carregou_clientes && self.erro_busca.is_none() {
                        ui.label(
                            RichText::new("Nenhum cliente encontrado")
                                .italics()
                                .color(Color32::from_gray(110)),
                        );
                    }
                } else {
                    egui::ScrollArea::vertical()
                        .id_source("lista_clientes")
                        .max_height(320.0)
                        .show(ui, |ui| {
                            for cliente in &self.clientes {
                                let mut marcado = self.selecao.contains(cliente.id);
                                ui.horizontal(|ui| {
                                    if ui.checkbox(&mut marcado, "").changed() {
                                        alternar = Some(cliente.id);
                                    }
                                    ui.vertical(|ui| {
                                        ui.label(RichText::new(&cliente.nome).strong());
                                        let detalhes = format!(
                                            "Tel: {} | Email: {}",
                                            cliente.telefone.as_deref().unwrap_or("sem telefone"),
                                            cliente.email.as_deref().unwrap_or("sem email"),
                                        );
                                        ui.label(
                                            RichText::new(detalhes)
                                                .size(12.0)
                                                .color(Color32::from_gray(105)),
                                        );
                                    });
                                    let cor = if cliente.is_ativo() { VERDE } else { LARANJA };
                                    ui.colored_label(cor, cliente.status_label());
                                });
                                ui.separator();
                            }
                        });
                }

                ui.add_space(10.0);
                ui.heading(format!("Selecionados ({})", self.selecao.count()));
                let selecionados = self.selecao.snapshot();
                if self.selecao.is_empty() {
                    ui.label(
                        RichText::new("Nenhum cliente selecionado")
                            .italics()
                            .color(Color32::from_gray(110)),
                    );
                } else {
                    egui::ScrollArea::vertical()
                        .id_source("lista_selecionados")
                        .max_height(160.0)
                        .show(ui, |ui| {
                            for cliente in &selecionados {
                                ui.horizontal(|ui| {
                                    if ui.small_button("x").clicked() {
                                        remover = Some(cliente.id);
                                    }
                                    ui.label(&cliente.nome);
                                });
                            }
                        });
                }
            });

            if busca_mudou {
                self.on_busca_alterada();
            }
            if recarregar {
                self.carregar_clientes();
            }
            if let Some(id) = alternar {
                self.selecao.toggle(id, &self.clientes);
            }
            if let Some(id) = remover {
                self.selecao.remove(id);
            }

            let mut pedir_preview = false;
            let mut pedir_envio = false;
            let mut confirmar = false;
            let mut cancelar = false;

            colunas[1].vertical(|ui| {
                ui.heading("Mensagem");

                ui.horizontal(|ui| {
                    ui.label("Tipo:");
                    egui::ComboBox::from_id_source("tipo_cobranca")
                        .selected_text(self.form.tipo.label())
                        .show_ui(ui, |ui| {
                            for tipo in TipoCobranca::ALL {
                                ui.selectable_value(&mut self.form.tipo, tipo, tipo.label());
                            }
                        });
                });

                ui.horizontal(|ui| {
                    ui.label("Template:");
                    let selecionado = if self.form.template.is_empty() {
                        "Mensagem personalizada".to_string()
                    } else {
                        self.form.template.clone()
                    };
                    egui::ComboBox::from_id_source("template_envio")
                        .selected_text(selecionado)
                        .show_ui(ui, |ui| {
                            ui.selectable_value(
                                &mut self.form.template,
                                String::new(),
                                "Mensagem personalizada",
                            );
                            let nomes: Vec<String> =
                                self.templates_ativos().map(|t| t.nome.clone()).collect();
                            for nome in nomes {
                                ui.selectable_value(&mut self.form.template, nome.clone(), nome);
                            }
                        });
                });

                if self.form.template.is_empty() {
                    ui.add(
                        TextEdit::multiline(&mut self.form.mensagem)
                            .hint_text("Mensagem para os clientes selecionados...")
                            .desired_rows(4)
                            .desired_width(f32::INFINITY),
                    );
                } else {
                    ui.label(
                        RichText::new("O template escolhido substitui a mensagem livre")
                            .size(12.0)
                            .color(Color32::from_gray(110)),
                    );
                }

                ui.add_space(6.0);
                ui.label(RichText::new("Variáveis extras").strong());
                egui::Grid::new("variaveis_extras")
                    .num_columns(2)
                    .spacing([8.0, 4.0])
                    .show(ui, |ui| {
                        ui.label("valor");
                        ui.text_edit_singleline(&mut self.form.valor);
                        ui.end_row();
                        ui.label("dia_vencimento");
                        ui.text_edit_singleline(&mut self.form.dia_vencimento);
                        ui.end_row();
                        ui.label("data_vencimento");
                        ui.text_edit_singleline(&mut self.form.data_vencimento);
                        ui.end_row();
                        ui.label("descricao");
                        ui.text_edit_singleline(&mut self.form.descricao);
                        ui.end_row();
                    });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!self.aguardando_preview, egui::Button::new("Preview"))
                        .clicked()
                    {
                        pedir_preview = true;
                    }
                    if ui
                        .add_enabled(
                            !self.enviando && !self.confirmando_envio,
                            egui::Button::new("Enviar em lote"),
                        )
                        .clicked()
                    {
                        pedir_envio = true;
                    }
                    if self.enviando || self.aguardando_preview {
                        ui.spinner();
                    }
                });

                if self.confirmando_envio {
                    egui::Frame::none()
                        .fill(Color32::from_rgb(255, 243, 205))
                        .rounding(egui::Rounding::same(8.0))
                        .inner_margin(egui::Margin::same(10.0))
                        .show(ui, |ui| {
                            ui.label(format!(
                                "Confirma envio para {} cliente(s)?",
                                self.selecao.snapshot().len()
                            ));
                            ui.horizontal(|ui| {
                                if ui.button("Confirmar").clicked() {
                                    confirmar = true;
                                }
                                if ui.button("Cancelar").clicked() {
                                    cancelar = true;
                                }
                            });
                        });
                }

                if let Some(preview) = &self.preview {
                    ui.add_space(8.0);
                    ui.label(
                        RichText::new(format!("Preview para {}", preview.cliente_nome)).strong(),
                    );
                    egui::Frame::none()
                        .fill(Color32::from_rgb(238, 238, 238))
                        .rounding(egui::Rounding::same(8.0))
                        .inner_margin(egui::Margin::same(10.0))
                        .show(ui, |ui| {
                            ui.monospace(&preview.mensagem_renderizada);
                        });
                    if !preview.variaveis_utilizadas.is_empty() {
                        let chaves: Vec<&str> = preview
                            .variaveis_utilizadas
                            .keys()
                            .map(String::as_str)
                            .collect();
                        ui.label(
                            RichText::new(format!("Variáveis: {}", chaves.join(", ")))
                                .size(12.0)
                                .color(Color32::from_gray(110)),
                        );
                    }
                }

                if let Some(err) = &self.erro_envio {
                    ui.add_space(8.0);
                    ui.colored_label(VERMELHO, format!("Erro no envio: {err}"));
                }

                if let Some(resultado) = &self.resultado {
                    ui.add_space(8.0);
                    ui.label(RichText::new("Resultado do envio").strong());
                    ui.label(format!(
                        "Total: {} | Enviados: {} | Erros: {}",
                        resultado.total_clientes, resultado.enviados, resultado.erros
                    ));
                    egui::ScrollArea::vertical()
                        .id_source("detalhes_envio")
                        .max_height(180.0)
                        .show(ui, |ui| {
                            for detalhe in &resultado.detalhes {
                                ui.horizontal(|ui| {
                                    let cor = if detalhe.status == "enviado" {
                                        VERDE
                                    } else {
                                        VERMELHO
                                    };
                                    ui.colored_label(cor, &detalhe.status);
                                    ui.label(RichText::new(&detalhe.cliente_nome).strong());
                                    if let Some(erro) = &detalhe.erro {
                                        ui.label(
                                            RichText::new(erro).size(12.0).color(VERMELHO),
                                        );
                                    }
                                });
                            }
                        });
                }
            });

            if pedir_preview {
                self.pedir_preview();
            }
            if pedir_envio {
                self.pedir_confirmacao_envio();
            }
            if confirmar {
                self.confirmar_envio();
            }
            if cancelar {
                self.confirmando_envio = false;
            }
        });
    }

    fn abrir_editor(&mut self, nome: String) {
        // Busca a versão atual antes de editar; um template apagado em
        // outra sessão aparece aqui como 404, não como edição cega.
        self.enviar_task(ApiTask::ObterTemplate { nome });
    }

    fn ui_templates(&mut self, ui: &mut egui::Ui) {
        let mut editar: Option<String> = None;
        let mut pedir_exclusao: Option<String> = None;
        let mut excluir: Option<String> = None;
        let mut cancelar_exclusao = false;
        let mut recarregar = false;
        let mut novo = false;

        ui.horizontal(|ui| {
            ui.heading("Templates");
            if ui.button("Atualizar").clicked() {
                recarregar = true;
            }
            if ui.button("Novo template").clicked() {
                novo = true;
            }
            if self.carregando_templates {
                ui.spinner();
            }
        });

        if let Some(err) = &self.erro_templates {
            ui.colored_label(VERMELHO, format!("Erro ao carregar templates: {err}"));
        }

        egui::ScrollArea::vertical()
            .id_source("lista_templates")
            .show(ui, |ui| {
                for template in &self.templates {
                    egui::Frame::none()
                        .fill(Color32::from_rgb(250, 250, 250))
                        .rounding(egui::Rounding::same(10.0))
                        .stroke(egui::Stroke::new(1.0, Color32::from_gray(220)))
                        .inner_margin(egui::Margin::same(12.0))
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                ui.label(RichText::new(&template.nome).size(16.0).strong());
                                let (cor, rotulo) = if template.ativo {
                                    (VERDE, "ativo")
                                } else {
                                    (LARANJA, "inativo")
                                };
                                ui.colored_label(cor, rotulo);
                            });
                            ui.monospace(&template.template_text);
                            ui.label(
                                RichText::new(format!(
                                    "Variáveis: {}",
                                    template.variaveis.as_deref().unwrap_or(
                                        "nome, valor, dia_vencimento, data_vencimento, descricao"
                                    )
                                ))
                                .size(12.0)
                                .color(Color32::from_gray(110)),
                            );
                            ui.horizontal(|ui| {
                                if ui.button("Editar").clicked() {
                                    editar = Some(template.nome.clone());
                                }
                                if ui.button("Excluir").clicked() {
                                    pedir_exclusao = Some(template.nome.clone());
                                }
                            });

                            if self.exclusao_pendente.as_deref() == Some(template.nome.as_str()) {
                                ui.colored_label(
                                    VERMELHO,
                                    format!("Excluir o template '{}'?", template.nome),
                                );
                                ui.horizontal(|ui| {
                                    if ui.button("Confirmar exclusão").clicked() {
                                        excluir = Some(template.nome.clone());
                                    }
                                    if ui.button("Cancelar").clicked() {
                                        cancelar_exclusao = true;
                                    }
                                });
                            }
                        });
                    ui.add_space(8.0);
                }
            });

        if recarregar {
            self.carregar_templates();
        }
        if novo {
            self.editor = Some(TemplateEditor::novo());
        }
        if let Some(nome) = editar {
            self.abrir_editor(nome);
        }
        if let Some(nome) = pedir_exclusao {
            self.exclusao_pendente = Some(nome);
        }
        if cancelar_exclusao {
            self.exclusao_pendente = None;
        }
        if let Some(nome) = excluir {
            self.excluir_template(nome);
        }
    }

    fn ui_editor_template(&mut self, ctx: &egui::Context) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };

        let mut salvar = false;
        let mut cancelar = false;
        let titulo = if editor.original.is_some() {
            "Editar template"
        } else {
            "Novo template"
        };

        egui::Window::new(titulo)
            .collapsible(false)
            .resizable(true)
            .default_width(460.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Nome:");
                    // O nome identifica o template no backend; só é
                    // editável na criação.
                    ui.add_enabled(
                        editor.original.is_none(),
                        TextEdit::singleline(&mut editor.nome),
                    );
                });
                ui.label("Texto:");
                ui.add(
                    TextEdit::multiline(&mut editor.texto)
                        .hint_text("Olá {nome}, sua fatura de {valor} vence em {data_vencimento}.")
                        .desired_rows(6)
                        .desired_width(f32::INFINITY),
                );
                ui.horizontal(|ui| {
                    ui.label("Variáveis:");
                    ui.add(
                        TextEdit::singleline(&mut editor.variaveis)
                            .hint_text("nome, valor, data_vencimento"),
                    );
                });
                if editor.original.is_some() {
                    ui.checkbox(&mut editor.ativo, "ativo");
                }

                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!editor.salvando, egui::Button::new("Salvar"))
                        .clicked()
                    {
                        salvar = true;
                    }
                    if ui.button("Cancelar").clicked() {
                        cancelar = true;
                    }
                    if editor.salvando {
                        ui.spinner();
                    }
                });
            });

        if salvar {
            self.salvar_editor();
        }
        if cancelar {
            self.editor = None;
        }
    }

    fn ui_dashboard(&mut self, ui: &mut egui::Ui) {
        let mut recarregar = false;

        ui.horizontal(|ui| {
            ui.heading("Dashboard");
            if ui.button("Atualizar").clicked() {
                recarregar = true;
            }
            if self.carregando_dashboard {
                ui.spinner();
            }
        });

        if let Some(err) = &self.erro_stats {
            ui.colored_label(VERMELHO, format!("Erro nas estatísticas: {err}"));
        }

        if let Some(stats) = &self.stats {
            ui.horizontal_wrapped(|ui| {
                stat_card(ui, AZUL, stats.total_clientes.to_string(), "Total de clientes");
                stat_card(ui, VERDE, stats.clientes_ativos.to_string(), "Clientes ativos");
                stat_card(
                    ui,
                    VERMELHO,
                    stats.clientes_inadimplentes.to_string(),
                    "Inadimplentes",
                );
                stat_card(ui, LARANJA, stats.cobrancas_mes.to_string(), "Cobranças no mês");
                stat_card(
                    ui,
                    LARANJA,
                    stats.documentos_pendentes.to_string(),
                    "Pendentes",
                );
                stat_card(
                    ui,
                    AZUL,
                    format!("{:.1}%", stats.taxa_resposta),
                    "Taxa de resposta",
                );
            });
        }

        ui.add_space(12.0);
        ui.label(RichText::new("Atividades recentes").size(16.0).strong());

        if let Some(err) = &self.erro_atividades {
            ui.colored_label(VERMELHO, format!("Erro nas atividades: {err}"));
        }

        if self.atividades.is_empty() && self.erro_atividades.is_none() {
            ui.label(
                RichText::new("Nenhuma atividade nos últimos dias")
                    .italics()
                    .color(Color32::from_gray(110)),
            );
        } else {
            egui::ScrollArea::vertical()
                .id_source("atividades")
                .show(ui, |ui| {
                    for atividade in &self.atividades {
                        ui.horizontal(|ui| {
                            let cor = if atividade.status == "enviado" {
                                VERDE
                            } else {
                                LARANJA
                            };
                            ui.colored_label(cor, &atividade.tipo);
                            ui.label(RichText::new(&atividade.cliente).strong());
                            if let Some(preview) = &atividade.preview {
                                ui.label(
                                    RichText::new(preview)
                                        .size(12.0)
                                        .color(Color32::from_gray(105)),
                                );
                            }
                        });
                        if let Some(data) = &atividade.data {
                            ui.label(
                                RichText::new(data).size(11.0).color(Color32::from_gray(130)),
                            );
                        }
                        ui.separator();
                    }
                });
        }

        if recarregar {
            self.carregar_dashboard();
        }
    }
}

impl App for DeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_cliente_results();
        self.apply_task_results();
        self.expire_status(ctx);
        self.tick_limpeza(ctx);

        egui::TopBottomPanel::top("topo").show(ctx, |ui| {
            self.ui_topo(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Envio => self.ui_envio(ui),
            Tab::Templates => self.ui_templates(ui),
            Tab::Dashboard => self.ui_dashboard(ui),
        });

        self.ui_editor_template(ctx);
        self.dispatch_due_search(ctx);
    }
}

fn stat_card(ui: &mut egui::Ui, cor: Color32, valor: String, rotulo: &str) {
    egui::Frame::none()
        .fill(cor)
        .rounding(egui::Rounding::same(10.0))
        .inner_margin(egui::Margin::symmetric(16.0, 12.0))
        .show(ui, |ui| {
            ui.vertical(|ui| {
                ui.label(RichText::new(valor).size(24.0).strong().color(Color32::WHITE));
                ui.label(RichText::new(rotulo).size(12.0).color(Color32::WHITE));
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cliente;

    fn form_com_mensagem(texto: &str) -> FormEnvio {
        FormEnvio {
            mensagem: texto.to_string(),
            ..FormEnvio::default()
        }
    }

    #[test]
    fn envio_sem_selecao_falha_na_validacao() {
        let form = form_com_mensagem("Olá!");
        assert!(montar_envio(Vec::new(), &form).is_err());
    }

    #[test]
    fn envio_sem_mensagem_e_sem_template_falha() {
        let form = form_com_mensagem("   ");
        assert!(montar_envio(vec![1], &form).is_err());
    }

    #[test]
    fn template_escolhido_suprime_mensagem_livre() {
        let mut form = form_com_mensagem("texto digitado");
        form.template = "lembrete_mensal".to_string();

        let request = montar_envio(vec![1, 2], &form).expect("request");
        assert_eq!(request.template_name.as_deref(), Some("lembrete_mensal"));
        assert!(request.mensagem_padrao.is_none());
    }

    #[test]
    fn mensagem_livre_vai_sem_template() {
        let form = form_com_mensagem("  Olá {nome}!  ");
        let request = montar_envio(vec![7], &form).expect("request");
        assert_eq!(request.mensagem_padrao.as_deref(), Some("Olá {nome}!"));
        assert!(request.template_name.is_none());
        assert!(request.enviar_agora);
        assert_eq!(request.clientes_ids, vec![7]);
    }

    #[test]
    fn variaveis_extras_so_incluem_campos_preenchidos() {
        let mut form = form_com_mensagem("msg");
        form.valor = " 150,00 ".to_string();
        form.descricao = "mensalidade".to_string();
        form.dia_vencimento = "   ".to_string();

        let extras = form.variaveis_extras();
        assert_eq!(extras.len(), 2);
        assert_eq!(extras.get("valor").map(String::as_str), Some("150,00"));
        assert_eq!(
            extras.get("descricao").map(String::as_str),
            Some("mensalidade")
        );
        assert!(!extras.contains_key("dia_vencimento"));
        assert!(!extras.contains_key("data_vencimento"));
    }

    #[test]
    fn sucesso_total_limpa_formulario_parcial_nao() {
        let detalhe = |status: &str| crate::models::DetalheEnvio {
            cliente_nome: "Ana".to_string(),
            status: status.to_string(),
            erro: None,
        };

        let sucesso = BatchSendResponse {
            total_clientes: 3,
            enviados: 3,
            erros: 0,
            detalhes: vec![detalhe("enviado"); 3],
        };
        assert!(envio_limpa_formulario(&sucesso));

        let parcial = BatchSendResponse {
            total_clientes: 3,
            enviados: 2,
            erros: 1,
            detalhes: vec![detalhe("enviado"), detalhe("enviado"), detalhe("erro")],
        };
        assert!(!envio_limpa_formulario(&parcial));
    }

    #[test]
    fn envio_usa_apenas_ids_com_registro_no_cache() {
        let lista = vec![Cliente {
            id: 1,
            nome: "Ana".to_string(),
            telefone: None,
            email: None,
            status: None,
        }];
        let mut selecao = SelectionStore::new();
        selecao.toggle(1, &lista);
        // Id selecionado sem registro visível não entra no lote.
        selecao.toggle(99, &[]);

        let ids: Vec<i64> = selecao.snapshot().iter().map(|c| c.id).collect();
        let request = montar_envio(ids, &form_com_mensagem("Olá")).expect("request");
        assert_eq!(request.clientes_ids, vec![1]);
    }
}
