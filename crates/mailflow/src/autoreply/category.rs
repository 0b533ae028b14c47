use std::fmt;

use serde::{Deserialize, Serialize};

/// Reply category, used to pick a template from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Contratos,
    Facturas,
    Reuniones,
    #[serde(rename = "RSVP")]
    Rsvp,
    Invitado,
    Proveedor,
    Finanzas,
    Urgente,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Contratos => "Contratos",
            Category::Facturas => "Facturas",
            Category::Reuniones => "Reuniones",
            Category::Rsvp => "RSVP",
            Category::Invitado => "Invitado",
            Category::Proveedor => "Proveedor",
            Category::Finanzas => "Finanzas",
            Category::Urgente => "Urgente",
            Category::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag keywords, checked in order. A tag matches when it contains any of
/// the keywords.
const TAG_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Contratos, &["contrato", "legal"]),
    (Category::Facturas, &["factura", "invoice", "recibo"]),
    (
        Category::Reuniones,
        &["reunión", "reunion", "meeting", "cita", "llamada"],
    ),
    (
        Category::Rsvp,
        &[
            "rsvp",
            "invitación",
            "invitacion",
            "confirmación",
            "confirmacion",
        ],
    ),
    (Category::Invitado, &["guest", "invitado"]),
    (
        Category::Proveedor,
        &[
            "proveedor",
            "catering",
            "fotógrafo",
            "fotografo",
            "dj",
            "música",
            "musica",
            "flor",
            "banquete",
            "venue",
        ],
    ),
    (
        Category::Finanzas,
        &[
            "finanzas",
            "presupuesto",
            "pago",
            "importe",
            "transferencia",
            "budget",
        ],
    ),
    (Category::Urgente, &["urgente", "emergencia", "asap"]),
];

/// Folder keywords, consulted only when no tag matched.
const FOLDER_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Contratos, &["contrato"]),
    (Category::Facturas, &["factura"]),
    (Category::Reuniones, &["meeting", "reun"]),
    (Category::Rsvp, &["rsvp", "invit"]),
    (Category::Invitado, &["guest", "invitado"]),
    (Category::Proveedor, &["proveedor"]),
    (Category::Finanzas, &["finan", "budget"]),
];

/// Maps classification tags and folder to a reply category.
pub fn map_to_category<S: AsRef<str>>(tags: &[S], folder: Option<&str>) -> Category {
    let tags: Vec<String> = tags.iter().map(|t| t.as_ref().to_lowercase()).collect();

    for (category, keywords) in TAG_KEYWORDS {
        if tags
            .iter()
            .any(|tag| keywords.iter().any(|k| tag.contains(k)))
        {
            return *category;
        }
    }

    if let Some(folder) = folder.map(str::to_lowercase).filter(|f| !f.is_empty()) {
        for (category, keywords) in FOLDER_KEYWORDS {
            if keywords.iter().any(|k| folder.contains(k)) {
                return *category;
            }
        }
    }

    Category::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_checked_in_priority_order() {
        // Contracts win over invoices even when listed later.
        assert_eq!(
            map_to_category(&["Facturas", "Contratos"], None),
            Category::Contratos
        );
        assert_eq!(map_to_category(&["RSVP", "Invitado"], None), Category::Rsvp);
        assert_eq!(
            map_to_category(&["Invitaciones"], None),
            Category::Rsvp
        );
        assert_eq!(map_to_category(&["Proveedor"], None), Category::Proveedor);
        assert_eq!(map_to_category(&["URGENTE"], None), Category::Urgente);
    }

    #[test]
    fn test_folder_fallback() {
        let none: [&str; 0] = [];
        assert_eq!(map_to_category(&none, Some("Proveedores")), Category::Proveedor);
        assert_eq!(map_to_category(&["VIP"], Some("Finanzas")), Category::Finanzas);
        assert_eq!(map_to_category(&none, Some("Reuniones")), Category::Reuniones);
    }

    #[test]
    fn test_general_when_nothing_matches() {
        let none: [&str; 0] = [];
        assert_eq!(map_to_category(&none, None), Category::General);
        assert_eq!(map_to_category(&["Misc"], Some("Inbox")), Category::General);
    }

    #[test]
    fn test_rsvp_serializes_uppercase() {
        assert_eq!(Category::Rsvp.to_string(), "RSVP");
        assert_eq!(serde_json::to_string(&Category::Rsvp).unwrap(), "\"RSVP\"");
    }
}
