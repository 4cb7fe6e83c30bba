//! The restaurant's fixed knowledge: one menu document and one business-info document.

use serde::{Deserialize, Serialize};

pub const MENU_SOURCE: &str = "menu.txt";
pub const INFO_SOURCE: &str = "info.txt";

const MENU_TEXT: &str = "
Aperitivos:
- Bruschetta Clásica: Pan tostado con tomates frescos, ajo, albahaca y aceite de oliva. Precio: $8. Ingredientes: pan, tomate, ajo, albahaca, aceite de oliva.
- Tabla de Quesos y Fiambres: Selección de quesos locales e importados con jamón serrano y salame. Precio: $15. Ingredientes: quesos variados, jamón serrano, salame.

Platos Principales:
- Lomo a la Pimienta: Medallón de lomo de 250g con salsa de pimienta y puré. Precio: $28. Ingredientes: lomo, pimienta, crema, puré de papas.
- Salmón a la Parrilla con Vegetales: Filete grillado con vegetales de estación. Precio: $25. Ingredientes: salmón, vegetales de estación.
- Risotto de Hongos (vegetariano): Arroz arbóreo con hongos y aceite de trufa. Precio: $22. Ingredientes: arroz, hongos, aceite de trufa, parmesano.

Postres:
- Tiramisú: Bizcocho, café, mascarpone y cacao. Precio: $9.
- Volcán de Chocolate: Centro líquido + helado de vainilla. Precio: $10.

Bebidas:
- Vino Malbec (copa): $7.
- Limonada con Menta y Jengibre: $5.
";

const INFO_TEXT: &str = "
La Delicia - Av. Italia 1234, Bariloche, Río Negro, Argentina.
Propietario: Antonio Rossi. Especialidad: Cocina italiana.
Horarios: Mar-Dom (12-16h y 20-23h). Lunes cerrado.
Tel: +54 294 412-3456 - Email: reservas@ladelicia.com.ar
Ambiente familiar. Capacidad 60 cubiertos. Acepta reservas y tarjetas.
";

/// A whole document before splitting, labelled with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into() }
    }
}

pub fn restaurant_documents() -> Vec<SourceDocument> {
    let documents = vec![
        SourceDocument::new(MENU_SOURCE, MENU_TEXT),
        SourceDocument::new(INFO_SOURCE, INFO_TEXT),
    ];
    tracing::info!(
        event_name = "knowledge.documents.loaded",
        document_count = documents.len(),
        "restaurant documents loaded"
    );
    documents
}
