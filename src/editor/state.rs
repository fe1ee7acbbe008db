//! In-memory protocol state, keyed by panel id.
//!
//! Every mutator applies optimistically and recomputes the derived
//! status before returning; persistence is someone else's job (see
//! [`crate::editor::autosave`]).

use std::collections::BTreeMap;

use crate::models::protocol::{
    Firma, ItemAnswer, Protocol, ProtocolStatus, Seccion, SignerRole,
};
use crate::templates;

/// The editor's working tree: one protocol per panel.
#[derive(Debug, Default, Clone)]
pub struct ProtocolEditor {
    protocols: BTreeMap<String, Protocol>,
}

impl ProtocolEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocols(&self) -> &BTreeMap<String, Protocol> {
        &self.protocols
    }

    pub fn protocol(&self, panel_id: &str) -> Option<&Protocol> {
        self.protocols.get(panel_id)
    }

    /// Ensure a panel has a protocol, seeding a fresh template document
    /// the first time the panel is opened.
    pub fn open_panel(&mut self, panel_id: &str) -> &Protocol {
        self.protocols
            .entry(panel_id.to_string())
            .or_insert_with(templates::default_protocol)
    }

    fn protocol_mut(&mut self, panel_id: &str) -> &mut Protocol {
        self.protocols
            .entry(panel_id.to_string())
            .or_insert_with(templates::default_protocol)
    }

    /// Tri-state toggle for one checklist cell. Selecting the answer the
    /// item already holds clears it back to unset; anything else
    /// replaces. Returns the recomputed aggregate status.
    pub fn toggle_item(
        &mut self,
        panel_id: &str,
        seccion: Seccion,
        code: &str,
        answer: ItemAnswer,
    ) -> ProtocolStatus {
        let protocol = self.protocol_mut(panel_id);
        let item = seccion.items_mut(protocol).entry(code.to_string()).or_default();
        item.estado = if item.estado == answer {
            ItemAnswer::Unset
        } else {
            answer
        };
        protocol.refresh_estado()
    }

    pub fn set_observacion(&mut self, panel_id: &str, seccion: Seccion, code: &str, text: &str) {
        let protocol = self.protocol_mut(panel_id);
        let item = seccion.items_mut(protocol).entry(code.to_string()).or_default();
        item.observacion = text.to_string();
    }

    /// Edit one phase-pair insulation reading in place.
    pub fn set_medicion<F>(&mut self, panel_id: &str, par: &str, edit: F)
    where
        F: FnOnce(&mut crate::models::protocol::MedicionAislamiento),
    {
        let protocol = self.protocol_mut(panel_id);
        let medicion = protocol
            .aislamiento
            .mediciones
            .entry(par.to_string())
            .or_default();
        edit(medicion);
    }

    pub fn set_firma(&mut self, panel_id: &str, role: SignerRole, firma: Firma) {
        self.protocol_mut(panel_id).firmas_digitales.insert(role, firma);
    }

    /// Header fields never affect the derived status, so edits go through
    /// a plain closure.
    pub fn edit_header<F>(&mut self, panel_id: &str, edit: F)
    where
        F: FnOnce(&mut Protocol),
    {
        edit(self.protocol_mut(panel_id));
    }

    /// Replace the whole tree, e.g. after a forced reload from the store.
    pub fn replace_all(&mut self, protocols: BTreeMap<String, Protocol>) {
        self.protocols = protocols;
    }
}
