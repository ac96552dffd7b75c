//! crates/compliance_core/src/schema.rs
//!
//! Entity type descriptors and the schema scanner that decides, for each
//! table, which columns are tracked deadlines.

use crate::domain::{ColumnInfo, TrackedField};

/// Display names for known certification and inspection codes.
const KNOWN_LABELS: &[(&str, &str)] = &[
    ("fimo", "FIMO"),
    ("caces", "CACES"),
    ("aipr", "AIPR"),
    ("airr", "AIRR"),
    ("ifo", "IFO"),
    ("hgo", "HGO"),
    ("bo", "BO"),
    ("hg0b0", "Habilitation H0B0"),
    ("visite_med", "Visite médicale"),
    ("brevet_secour", "Brevet secouriste"),
    ("date_validite", "Date de validité"),
    ("limit_periodic_inspection", "Contrôle périodique"),
    ("limit_additional_inspection", "Contrôle complémentaire"),
    ("ct_soeco_date", "Contrôle technique (SOECO)"),
    ("euromaster_chrono", "Chronotachygraphe (Euromaster)"),
    ("euromaster_limiteur", "Limiteur de vitesse (Euromaster)"),
    ("ned92_chrono", "Chronotachygraphe (NED92)"),
    ("ned92_limiteur", "Limiteur de vitesse (NED92)"),
];

/// Name fragments that mark a column as a deadline.
const DEADLINE_TOKENS: &[&str] = &[
    "date", "limit", "expir", "validite", "validity", "echeance", "visite",
];

const VEHICLE_DISPLAY: &[&str] = &["license_plate", "brand", "commercial_type"];

/// Row bookkeeping columns, never deadlines.
const BOOKKEEPING: &[&str] = &["id", "created_at", "updated_at"];

//=========================================================================================
// Entity type descriptors
//=========================================================================================

/// How the tracked fields of an entity type are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Exactly these fields, in this order.
    Declared(Vec<TrackedField>),
    /// Every column matching the deadline heuristic, in table order.
    Discover,
}

/// Static description of one tracked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub table: String,
    pub display_fields: Vec<String>,
    pub comment_field: Option<String>,
    pub selection: FieldSelection,
    /// (deadline column, completion column) pairs.
    pub completion_pairs: Vec<(String, String)>,
}

impl EntityType {
    pub fn new(table: &str, display_fields: &[&str], comment_field: Option<&str>) -> Self {
        Self {
            table: table.to_string(),
            display_fields: display_fields.iter().map(|f| f.to_string()).collect(),
            comment_field: comment_field.map(str::to_string),
            selection: FieldSelection::Discover,
            completion_pairs: Vec::new(),
        }
    }

    pub fn declared(mut self, fields: Vec<TrackedField>) -> Self {
        self.selection = FieldSelection::Declared(fields);
        self
    }

    pub fn paired(mut self, deadline: &str, completion: &str) -> Self {
        self.completion_pairs
            .push((deadline.to_string(), completion.to_string()));
        self
    }

    fn completion_for(&self, deadline: &str) -> Option<String> {
        self.completion_pairs
            .iter()
            .find(|(d, _)| d == deadline)
            .map(|(_, c)| c.clone())
    }

    fn is_completion_column(&self, name: &str) -> bool {
        self.completion_pairs.iter().any(|(_, c)| c == name)
    }

    fn is_display_column(&self, name: &str) -> bool {
        self.display_fields.iter().any(|f| f == name) || self.comment_field.as_deref() == Some(name)
    }
}

/// The entity types this deployment knows about.
pub fn builtin_catalog() -> Vec<EntityType> {
    vec![
        EntityType::new("collaborateurs", &["nom", "prenom"], Some("commentaire")).declared(
            [
                "ifo",
                "caces",
                "airr",
                "hgo",
                "bo",
                "visite_med",
                "brevet_secour",
                "fimo",
                "aipr",
                "hg0b0",
            ]
            .iter()
            .map(|name| TrackedField::new(name, &label_for(name)))
            .collect(),
        ),
        EntityType::new("collaborateurs_poids_lourds", &["nom", "prenom"], Some("commentaire"))
            .declared(vec![TrackedField::new("date_validite", "Date de validité")]),
        EntityType::new("vehicles_1", VEHICLE_DISPLAY, Some("comments"))
            .paired("limit_periodic_inspection", "date_periodic_inspection")
            .paired("limit_additional_inspection", "date_additional_inspection"),
        // One intervention date covers both workshops' deadlines.
        EntityType::new("vehicles_2", VEHICLE_DISPLAY, Some("comments"))
            .paired("ct_soeco_date", "date_technical_inspection")
            .paired("euromaster_chrono", "date_chrono")
            .paired("ned92_chrono", "date_chrono")
            .paired("euromaster_limiteur", "date_limiteur")
            .paired("ned92_limiteur", "date_limiteur"),
    ]
}

/// Looks an entity type up by table name.
pub fn find_entity_type<'a>(catalog: &'a [EntityType], table: &str) -> Option<&'a EntityType> {
    catalog.iter().find(|e| e.table == table)
}

//=========================================================================================
// Scanner
//=========================================================================================

/// Resolves the tracked fields of `entity` against the columns the table
/// actually has. Declared fields missing from the table are dropped with a
/// warning; discovered fields follow [`is_deadline_column`].
pub fn scan(entity: &EntityType, columns: &[ColumnInfo]) -> Vec<TrackedField> {
    let has_column = |name: &str| columns.iter().any(|c| c.name.eq_ignore_ascii_case(name));

    match &entity.selection {
        FieldSelection::Declared(fields) => fields
            .iter()
            .filter(|field| {
                let present = has_column(&field.name);
                if !present {
                    tracing::warn!(
                        table = %entity.table,
                        field = %field.name,
                        "Declared tracked field is missing from the table; ignoring it"
                    );
                }
                present
            })
            .map(|field| {
                let mut field = field.clone();
                if field.completion_field.is_none() {
                    field.completion_field = entity.completion_for(&field.name);
                }
                field
            })
            .collect(),
        FieldSelection::Discover => columns
            .iter()
            .filter(|c| !entity.is_completion_column(&c.name) && !entity.is_display_column(&c.name))
            .filter(|c| is_deadline_column(c))
            .map(|c| TrackedField {
                name: c.name.clone(),
                label: label_for(&c.name),
                completion_field: entity.completion_for(&c.name),
            })
            .collect(),
    }
}

/// A column is a deadline when its declared type is a date/datetime type or
/// its name matches the deadline vocabulary or a known certification code.
pub fn is_deadline_column(column: &ColumnInfo) -> bool {
    let name = column.name.to_lowercase();
    if BOOKKEEPING.contains(&name.as_str()) {
        return false;
    }
    let declared = column.declared_type.to_uppercase();
    declared.contains("DATE")
        || declared.contains("TIMESTAMP")
        || DEADLINE_TOKENS.iter().any(|t| name.contains(t))
        || KNOWN_LABELS.iter().any(|(code, _)| *code == name)
}

/// Known display name for a certification code, else the column name
/// title-cased with underscores turned into spaces.
pub fn label_for(name: &str) -> String {
    let lowered = name.to_lowercase();
    if let Some((_, label)) = KNOWN_LABELS.iter().find(|(code, _)| *code == lowered) {
        return label.to_string();
    }
    lowered
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn vehicle_table(table: &str) -> EntityType {
        builtin_catalog()
            .into_iter()
            .find(|e| e.table == table)
            .unwrap()
    }

    fn names(fields: &[TrackedField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Columns of the `vehicles_1` table as created by the import script.
    pub(crate) fn vehicles_1_columns() -> Vec<ColumnInfo> {
        [
            ("id", "INTEGER"),
            ("vehicle_type", "TEXT"),
            ("brand", "TEXT"),
            ("commercial_type", "TEXT"),
            ("group_number", "INTEGER"),
            ("license_plate", "TEXT"),
            ("limit_periodic_inspection", "TEXT"),
            ("kilometer_periodic_inspection", "INTEGER"),
            ("limit_additional_inspection", "TEXT"),
            ("kilometer_additional_inspection", "INTEGER"),
            ("date_periodic_inspection", "TEXT"),
            ("date_additional_inspection", "TEXT"),
            ("comments", "TEXT"),
            ("created_at", "DATETIME"),
            ("updated_at", "DATETIME"),
        ]
        .iter()
        .map(|(name, ty)| ColumnInfo::new(name, ty))
        .collect()
    }

    #[test]
    fn vehicles_1_tracks_limits_and_pairs_their_dates() {
        let fields = scan(&vehicle_table("vehicles_1"), &vehicles_1_columns());
        assert_eq!(
            names(&fields),
            vec!["limit_periodic_inspection", "limit_additional_inspection"]
        );
        assert_eq!(
            fields[0].completion_field.as_deref(),
            Some("date_periodic_inspection")
        );
        assert_eq!(
            fields[1].completion_field.as_deref(),
            Some("date_additional_inspection")
        );
        assert_eq!(fields[0].label, "Contrôle périodique");
    }

    #[test]
    fn vehicles_2_pairs_both_workshops_with_one_intervention_date() {
        let columns: Vec<ColumnInfo> = [
            ("id", "INTEGER"),
            ("license_plate", "VARCHAR"),
            ("work_with", "VARCHAR"),
            ("kilometer_additional_inspection", "INTEGER"),
            ("ct_soeco_date", "DATE"),
            ("euromaster_chrono", "DATE"),
            ("euromaster_limiteur", "DATE"),
            ("ned92_chrono", "DATE"),
            ("ned92_limiteur", "DATE"),
            ("date_technical_inspection", "DATE"),
            ("date_chrono", "DATE"),
            ("date_limiteur", "DATE"),
            ("comments", "TEXT"),
            ("created_at", "DATETIME"),
        ]
        .iter()
        .map(|(name, ty)| ColumnInfo::new(name, ty))
        .collect();

        let fields = scan(&vehicle_table("vehicles_2"), &columns);
        assert_eq!(
            names(&fields),
            vec![
                "ct_soeco_date",
                "euromaster_chrono",
                "euromaster_limiteur",
                "ned92_chrono",
                "ned92_limiteur"
            ]
        );
        let completions: Vec<Option<&str>> = fields
            .iter()
            .map(|f| f.completion_field.as_deref())
            .collect();
        assert_eq!(
            completions,
            vec![
                Some("date_technical_inspection"),
                Some("date_chrono"),
                Some("date_limiteur"),
                Some("date_chrono"),
                Some("date_limiteur")
            ]
        );
    }

    #[test]
    fn declared_fields_keep_order_and_drop_missing_columns() {
        let collaborateurs = builtin_catalog().remove(0);
        let columns = vec![
            ColumnInfo::new("id", "INTEGER"),
            ColumnInfo::new("nom", "VARCHAR"),
            ColumnInfo::new("visite_med", "DATE"),
            ColumnInfo::new("caces", "DATE"),
        ];
        let fields = scan(&collaborateurs, &columns);
        assert_eq!(names(&fields), vec!["caces", "visite_med"]);
        assert_eq!(fields[1].label, "Visite médicale");
    }

    #[test]
    fn table_without_deadlines_yields_nothing() {
        let entity = EntityType::new("misc", &["name"], None);
        let columns = vec![ColumnInfo::new("id", "INTEGER"), ColumnInfo::new("name", "TEXT")];
        assert!(scan(&entity, &columns).is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(label_for("visite_med"), "Visite médicale");
        assert_eq!(label_for("CACES"), "CACES");
        assert_eq!(label_for("ned92_limiteur"), "Limiteur de vitesse (NED92)");
        assert_eq!(
            label_for("kilometer_periodic_inspection"),
            "Kilometer Periodic Inspection"
        );
    }

    #[test]
    fn bookkeeping_columns_are_never_deadlines() {
        assert!(!is_deadline_column(&ColumnInfo::new("updated_at", "DATETIME")));
        assert!(is_deadline_column(&ColumnInfo::new("expiry", "TEXT")));
        assert!(is_deadline_column(&ColumnInfo::new("fimo", "")));
    }
}
