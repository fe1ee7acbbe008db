//! FAT protocol documents (protocolo de ensayos), one per panel.
//!
//! The aggregate `estado` is derived from the four pass/fail checklist
//! sections and is never settable directly; every write path recomputes
//! it. Insulation measurements (`aislamiento`) and header fields do not
//! participate in the derivation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer for a single checklist item. Re-selecting the active answer
/// clears it back to `Unset` (the implicit fourth state of the
/// three-state control).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemAnswer {
    #[serde(rename = "SI")]
    Si,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "NA")]
    Na,
    #[default]
    #[serde(rename = "")]
    Unset,
}

/// One checklist row: the tri-state answer plus a free-text observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistItem {
    pub estado: ItemAnswer,
    pub observacion: String,
}

/// Map item-code -> answer for one checklist section.
pub type ChecklistSection = BTreeMap<String, ChecklistItem>;

/// The four checklist sections of a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seccion {
    Estructura,
    Electromontaje,
    Pruebas,
    ControlFinal,
}

impl Seccion {
    pub const ALL: [Seccion; 4] = [
        Seccion::Estructura,
        Seccion::Electromontaje,
        Seccion::Pruebas,
        Seccion::ControlFinal,
    ];

    pub fn items<'a>(&self, protocol: &'a Protocol) -> &'a ChecklistSection {
        match self {
            Seccion::Estructura => &protocol.estructura,
            Seccion::Electromontaje => &protocol.electromontaje,
            Seccion::Pruebas => &protocol.pruebas,
            Seccion::ControlFinal => &protocol.control_final,
        }
    }

    pub fn items_mut<'a>(&self, protocol: &'a mut Protocol) -> &'a mut ChecklistSection {
        match self {
            Seccion::Estructura => &mut protocol.estructura,
            Seccion::Electromontaje => &mut protocol.electromontaje,
            Seccion::Pruebas => &mut protocol.pruebas,
            Seccion::ControlFinal => &mut protocol.control_final,
        }
    }
}

/// Insulation-resistance reading for one phase pair. Empty string and
/// absent are distinct on the wire, so the fields are optional and
/// skipped when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicionAislamiento {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resistencia1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidad1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resistencia2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidad2: Option<String>,
}

/// Insulation-resistance block: instrument metadata plus readings for
/// the four phase pairs. Never affects the derived `estado`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Aislamiento {
    pub instrumento: String,
    pub marca: String,
    pub tension_ensayo: String,
    pub mediciones: BTreeMap<String, MedicionAislamiento>,
}

/// Roles that may sign a protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    Realizo,
    Controlo,
    Aprobo,
}

/// Digital signature record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Firma {
    pub nombre: String,
    pub cargo: String,
    /// Signature image as a data URL.
    pub imagen: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Aggregate protocol status. Derived only; see [`derive_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolStatus {
    #[serde(rename = "APROBADO")]
    Aprobado,
    #[default]
    #[serde(rename = "PENDIENTE")]
    Pendiente,
    #[serde(rename = "RECHAZADO")]
    Rechazado,
}

/// One FAT protocol document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Protocol {
    // Header
    pub fecha: String,
    pub cliente: String,
    pub orden_trabajo: String,
    pub tension_nominal: String,
    pub frecuencia: String,
    pub corriente_nominal: String,
    pub marca: String,
    pub modelo: String,
    pub numero_serie: String,

    // Checklist sections
    pub estructura: ChecklistSection,
    pub electromontaje: ChecklistSection,
    pub pruebas: ChecklistSection,
    pub control_final: ChecklistSection,

    pub aislamiento: Aislamiento,

    /// Derived from the checklist sections. Recomputed on every write
    /// and on normalization; a stored value is never trusted.
    pub estado: ProtocolStatus,

    pub firmas_digitales: BTreeMap<SignerRole, Firma>,
}

impl Protocol {
    /// Recompute and store the derived status. Returns the new value.
    pub fn refresh_estado(&mut self) -> ProtocolStatus {
        self.estado = derive_status(self);
        self.estado
    }
}

/// Derive the aggregate status from the union of the four checklist
/// sections. Precedence: RECHAZADO > PENDIENTE > APROBADO. A protocol
/// with no checklist items at all is PENDIENTE.
pub fn derive_status(protocol: &Protocol) -> ProtocolStatus {
    let items = Seccion::ALL
        .iter()
        .flat_map(|seccion| seccion.items(protocol).values());

    let mut seen_any = false;
    let mut any_unset = false;
    for item in items {
        seen_any = true;
        match item.estado {
            ItemAnswer::No => return ProtocolStatus::Rechazado,
            ItemAnswer::Unset => any_unset = true,
            ItemAnswer::Si | ItemAnswer::Na => {}
        }
    }

    if !seen_any || any_unset {
        ProtocolStatus::Pendiente
    } else {
        ProtocolStatus::Aprobado
    }
}
