//! FAT checklist template catalog.
//!
//! The catalog drives three things: the `/api/templates` endpoints, the
//! default protocol handed to the editor for a fresh panel, and the
//! normalization pass that back-fills missing sections, items and
//! measurement slots when a stored protocol is reloaded.

use serde::Serialize;

use crate::models::protocol::{
    derive_status, ChecklistItem, MedicionAislamiento, Protocol, Seccion,
};

/// One checklist template: the fixed item set for a protocol section.
#[derive(Debug, Clone, Copy)]
pub struct ChecklistTemplate {
    pub id: &'static str,
    pub nombre: &'static str,
    pub categoria: &'static str,
    pub seccion: Seccion,
    /// (item-code, label)
    pub items: &'static [(&'static str, &'static str)],
}

/// Phase pairs measured during the insulation-resistance test.
pub const FASE_PARES: [&str; 4] = ["R-S", "S-T", "R-T", "N-RST"];

pub const CHECKLIST_TEMPLATES: [ChecklistTemplate; 4] = [
    ChecklistTemplate {
        id: "estructura",
        nombre: "Estructura y gabinete",
        categoria: "montaje",
        seccion: Seccion::Estructura,
        items: &[
            ("est-01", "Dimensiones del gabinete según plano"),
            ("est-02", "Pintura y acabado superficial"),
            ("est-03", "Fijación de puertas, bisagras y cerraduras"),
            ("est-04", "Grado de protección IP conforme a especificación"),
            ("est-05", "Placas de identificación y señalética"),
        ],
    },
    ChecklistTemplate {
        id: "electromontaje",
        nombre: "Electromontaje",
        categoria: "montaje",
        seccion: Seccion::Electromontaje,
        items: &[
            ("em-01", "Apriete de conexiones de potencia"),
            ("em-02", "Sección de conductores según planos"),
            ("em-03", "Identificación de cables y borneras"),
            ("em-04", "Montaje de aparatos según layout"),
            ("em-05", "Barra de tierra y continuidad de PE"),
        ],
    },
    ChecklistTemplate {
        id: "pruebas",
        nombre: "Pruebas funcionales",
        categoria: "ensayos",
        seccion: Seccion::Pruebas,
        items: &[
            ("pr-01", "Ensayo de rigidez dieléctrica"),
            ("pr-02", "Continuidad del circuito de protección"),
            ("pr-03", "Funcionamiento de enclavamientos"),
            ("pr-04", "Secuencia de fases"),
            ("pr-05", "Operación de protecciones y disparos"),
        ],
    },
    ChecklistTemplate {
        id: "control-final",
        nombre: "Control final",
        categoria: "inspeccion",
        seccion: Seccion::ControlFinal,
        items: &[
            ("cf-01", "Limpieza interior del tablero"),
            ("cf-02", "Torque final verificado y marcado"),
            ("cf-03", "Documentación adjunta completa"),
            ("cf-04", "Embalaje y protección para transporte"),
        ],
    },
];

pub fn template_by_id(id: &str) -> Option<&'static ChecklistTemplate> {
    CHECKLIST_TEMPLATES.iter().find(|t| t.id == id)
}

/// Serializable view of a template for the API.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    pub id: &'static str,
    pub nombre: &'static str,
    pub categoria: &'static str,
    pub items: Vec<TemplateItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateItemView {
    pub codigo: &'static str,
    pub descripcion: &'static str,
}

impl From<&ChecklistTemplate> for TemplateView {
    fn from(t: &ChecklistTemplate) -> Self {
        TemplateView {
            id: t.id,
            nombre: t.nombre,
            categoria: t.categoria,
            items: t
                .items
                .iter()
                .map(|(codigo, descripcion)| TemplateItemView {
                    codigo,
                    descripcion,
                })
                .collect(),
        }
    }
}

/// A fresh protocol with every template item unset and every phase pair
/// present but unmeasured. Derived status starts at PENDIENTE.
pub fn default_protocol() -> Protocol {
    let mut protocol = Protocol::default();
    normalize(&mut protocol);
    protocol
}

/// Back-fill a protocol against the template: missing checklist items and
/// measurement slots are inserted unset, present answers are left alone,
/// and the derived status is recomputed from the result.
pub fn normalize(protocol: &mut Protocol) {
    for template in &CHECKLIST_TEMPLATES {
        let section = template.seccion.items_mut(protocol);
        for (code, _) in template.items {
            section
                .entry((*code).to_string())
                .or_insert_with(ChecklistItem::default);
        }
    }
    for par in FASE_PARES {
        protocol
            .aislamiento
            .mediciones
            .entry(par.to_string())
            .or_insert_with(MedicionAislamiento::default);
    }
    protocol.estado = derive_status(protocol);
}
