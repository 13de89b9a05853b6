//! Rule-based FAQ assistant.
//!
//! Answers come from a fixed Spanish dictionary. A query matches the first
//! entry, in dictionary order, whose key it contains or that contains it.

use serde::Serialize;

pub struct FaqEntry {
    pub key: &'static str,
    pub answer: &'static str,
    pub suggestions: &'static [&'static str],
}

const MAINTENANCE_ANSWER: &str = "¡$0 cuotas de mantenimiento y $0 gastos extra! Por política WEEK-CHAIN, retenemos 4 semanas de baja temporada por alojamiento. Estas se destinan a: 1) Cobertura de gastos (limpieza, seguro, mantenimiento, reparaciones) y 2) Incentivar el ecosistema (desarrollo, soporte 24/7, mejoras). Resultado: experiencia sin fricción por 15 años.";

pub const FAQ: &[FaqEntry] = &[
    FaqEntry {
        key: "qué es weekchain",
        answer: "WEEK-CHAIN™ es una plataforma de certificados vacacionales inteligentes. Permitimos solicitar semanas en alojamientos de lujo respaldadas por Certificados Digitales verificados. No son timeshares tradicionales: tu certificado es un derecho de uso por 15 años.",
        suggestions: &["¿Cómo funciona?", "¿Cuánto cuesta?", "¿Es legal?"],
    },
    FaqEntry {
        key: "cómo funciona",
        answer: "Es muy simple: 1) Elige tu certificado según el tamaño de tu grupo 2) Compra con tarjeta, OXXO o SPEI 3) Recibe tu Certificado Digital 4) Solicita tus semanas con anticipación 5) Disfruta tus vacaciones. Todo el proceso es 100% digital.",
        suggestions: &["Ver alojamientos", "Métodos de pago", "¿Es seguro?"],
    },
    FaqEntry {
        key: "cuánto cuesta",
        answer: "Los certificados empiezan desde $3,500 USD para 2 personas y 1 estancia al año. Por política WEEK-CHAIN, retenemos 4 semanas de baja temporada para cubrir gastos e incentivar el ecosistema. Esto significa $0 cuotas de mantenimiento: solo pagas una vez y tu certificado es válido por 15 años.",
        suggestions: &["Ver precios", "¿Hay descuentos?", "Métodos de pago"],
    },
    FaqEntry {
        key: "métodos de pago",
        answer: "Aceptamos tarjetas de crédito/débito, OXXO (efectivo, en pagos de hasta $10,000 MXN) y SPEI (transferencia bancaria). Todos los pagos son seguros.",
        suggestions: &["¿Cuánto cuesta?", "¿Es seguro?", "Proceso de compra"],
    },
    FaqEntry {
        key: "es legal",
        answer: "¡Absolutamente! Todas las transacciones están respaldadas legalmente. Los Certificados Digitales cuentan con certificación NOM-151 y cada uno representa un derecho de uso temporal verificado. Cumplimos con las regulaciones mexicanas.",
        suggestions: &["Ver documentos legales", "¿Qué es un Certificado Digital?", "¿Es seguro?"],
    },
    FaqEntry {
        key: "qué es certificado digital",
        answer: "Un Certificado Digital es un documento único y verificado digitalmente que representa el derecho temporal de uso de tus semanas vacacionales. Es como un título digital respaldado por contrato notarizado.",
        suggestions: &["¿Es seguro?", "¿Cómo funciona?"],
    },
    FaqEntry {
        key: "qué es nft",
        answer: "En WEEK-CHAIN™ utilizamos Certificados Digitales: documentos únicos y verificados que representan el derecho temporal de uso de tus semanas vacacionales.",
        suggestions: &["¿Es seguro?", "¿Cómo funciona?"],
    },
    FaqEntry {
        key: "broker",
        answer: "¡Excelente! Como broker en WEEK-CHAIN™ ganas comisiones por cada venta más comisiones multinivel de tu red. Acceso a dashboard profesional para monitorear tus ventas y equipo en tiempo real. ¿Quieres más información?",
        suggestions: &["Aplicar como broker", "Ver comisiones", "Dashboard broker"],
    },
    FaqEntry {
        key: "comisiones broker",
        answer: "Los brokers ganan del 4% al 6% de comisión directa según su nivel, 1% sobre ventas de segundo nivel y 0.5% de tercer nivel. Broker Elite incluye bono de retiro.",
        suggestions: &["Aplicar como broker", "Programa Elite", "Registrarme"],
    },
    FaqEntry {
        key: "propietario",
        answer: "¿Tienes un alojamiento vacacional? Súmalo a nuestra red y obtén gestión profesional incluida y acceso a nuestra red de miembros.",
        suggestions: &["Registrar alojamiento", "Requisitos", "Beneficios"],
    },
    FaqEntry {
        key: "vender",
        answer: "Puedes transferir tu certificado conforme a los términos vigentes. Contáctanos para conocer el proceso.",
        suggestions: &["Contacto", "Términos y condiciones"],
    },
    FaqEntry {
        key: "vafi",
        answer: "VA-FI (Vacation Finance) es un concepto en desarrollo y en proceso de cumplimiento regulatorio. ¡Únete a la lista de espera!",
        suggestions: &["¿Cómo funciona VA-FI?", "Lista de espera"],
    },
    FaqEntry {
        key: "referidos",
        answer: "¡Gana dinero recomendando WEEK-CHAIN™! Por cada amigo que compre con tu código en los siguientes 30 días, ganas comisión.",
        suggestions: &["Crear código de referido", "Ver comisiones", "Compartir enlace"],
    },
    FaqEntry {
        key: "contacto",
        answer: "Email: support@week-chain.com\nWhatsApp: +52 998 123 4567\nRedes sociales: @weekchain\n\nHorario de atención: Lun-Vie 9am-6pm (México)",
        suggestions: &["Enviar mensaje", "FAQ", "Soporte técnico"],
    },
    FaqEntry {
        key: "cuotas mantenimiento",
        answer: MAINTENANCE_ANSWER,
        suggestions: &["¿Cuánto cuesta?", "¿Cómo funciona?", "Ver alojamientos"],
    },
    FaqEntry {
        key: "mantenimiento",
        answer: MAINTENANCE_ANSWER,
        suggestions: &["¿Cuánto cuesta?", "¿Cómo funciona?", "Ver alojamientos"],
    },
];

pub const FALLBACK_ANSWER: &str = "Interesante pregunta. Te recomiendo contactar a nuestro equipo de soporte para una respuesta más específica. support@week-chain.com o visita nuestra sección de FAQ.";
pub const FALLBACK_SUGGESTIONS: &[&str] = &["Ver FAQ", "Contacto", "Hablar con humano"];
pub const WELCOME_MESSAGE: &str =
    "¡Hola! Soy el asistente virtual de WEEK-CHAIN™. ¿En qué puedo ayudarte hoy?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickAction {
    pub label: &'static str,
    pub query: &'static str,
}

pub const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        label: "¿Qué es WEEK-CHAIN?",
        query: "qué es weekchain",
    },
    QuickAction {
        label: "¿Cómo funciona?",
        query: "cómo funciona",
    },
    QuickAction {
        label: "Métodos de pago",
        query: "métodos de pago",
    },
    QuickAction {
        label: "Ser Broker",
        query: "broker",
    },
    QuickAction {
        label: "Contacto",
        query: "contacto",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub suggestions: Vec<String>,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_key: Option<String>,
}

pub fn find_best_match(query: &str) -> Option<&'static FaqEntry> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    FAQ.iter()
        .find(|entry| normalized.contains(entry.key) || entry.key.contains(normalized.as_str()))
}

/// A clicked quick-action label is replaced by its canned query.
pub fn resolve_suggestion(text: &str) -> &str {
    QUICK_ACTIONS
        .iter()
        .find(|a| a.label == text)
        .map_or(text, |a| a.query)
}

pub fn ask(query: &str) -> ChatAnswer {
    let query = resolve_suggestion(query.trim());
    match find_best_match(query) {
        Some(entry) => ChatAnswer {
            answer: entry.answer.to_string(),
            suggestions: entry.suggestions.iter().map(|s| s.to_string()).collect(),
            matched: true,
            matched_key: Some(entry.key.to_string()),
        },
        None => ChatAnswer {
            answer: FALLBACK_ANSWER.to_string(),
            suggestions: FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            matched: false,
            matched_key: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_containing_key_matches() {
        let answer = ask("Hola, ¿CÓMO FUNCIONA esto?");
        assert!(answer.matched);
        assert_eq!(answer.matched_key.as_deref(), Some("cómo funciona"));
    }

    #[test]
    fn test_key_containing_query_matches() {
        let answer = ask("contac");
        assert_eq!(answer.matched_key.as_deref(), Some("contacto"));
    }

    #[test]
    fn test_dictionary_order_wins() {
        // "broker" is listed before "comisiones broker".
        assert_eq!(ask("comisiones broker").matched_key.as_deref(), Some("broker"));
        // "cuotas mantenimiento" is listed before "mantenimiento".
        assert_eq!(
            ask("cuotas mantenimiento").matched_key.as_deref(),
            Some("cuotas mantenimiento")
        );
    }

    #[test]
    fn test_empty_and_unknown_fall_back() {
        let empty = ask("   ");
        assert!(!empty.matched);
        assert_eq!(empty.answer, FALLBACK_ANSWER);
        let unknown = ask("xyzzy plugh");
        assert!(!unknown.matched);
        assert_eq!(unknown.suggestions, vec!["Ver FAQ", "Contacto", "Hablar con humano"]);
    }

    #[test]
    fn test_quick_action_label_resolves() {
        assert_eq!(ask("Ser Broker").matched_key.as_deref(), Some("broker"));
    }
}
