//! In-memory endpoint database: aggregates extractor output, rectifies the
//! variant hierarchy, and answers relevance-scored best-match queries from
//! scanner-reported vulnerability locations.

use crate::cleaner::{self, PathCleaner};
use crate::model::{Endpoint, FrameworkType, RouteParameter};
use std::collections::HashMap;
use tracing::debug;

/// Fixed bonus contributed by every matched path segment.
const SEGMENT_BONUS: i64 = 10;
/// Bonus when the candidate declares the queried parameter.
const PARAMETER_BONUS: i64 = 25;

pub struct EndpointDatabase {
    framework: FrameworkType,
    endpoints: Vec<Endpoint>,
    by_file: HashMap<String, Vec<usize>>,
}

impl EndpointDatabase {
    /// Builds the database from raw extractor output: paths are cleaned,
    /// same-site endpoints collapse into one primary plus variants, and
    /// parameter detections are unified across each variant group.
    pub fn new(
        framework: FrameworkType,
        raw_endpoints: Vec<Endpoint>,
        path_cleaner: &PathCleaner,
    ) -> Self {
        let mut cleaned = raw_endpoints;
        for endpoint in &mut cleaned {
            clean_paths(endpoint, path_cleaner);
        }
        let endpoints = rectify_variant_hierarchy(cleaned);

        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, endpoint) in endpoints.iter().enumerate() {
            by_file
                .entry(endpoint.file_path.to_ascii_lowercase())
                .or_default()
                .push(index);
        }
        Self {
            framework,
            endpoints,
            by_file,
        }
    }

    pub fn framework(&self) -> FrameworkType {
        self.framework
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Reverse lookup: every primary endpoint declared in one file.
    pub fn endpoints_for_file(&self, file_path: &str) -> Option<Vec<&Endpoint>> {
        let indices = self.by_file.get(&file_path.to_ascii_lowercase())?;
        Some(indices.iter().map(|&i| &self.endpoints[i]).collect())
    }

    /// Best match under strict rules: the HTTP method filters candidates.
    pub fn find_best_match(
        &self,
        url: &str,
        http_method: &str,
        parameter: Option<&str>,
    ) -> Option<&Endpoint> {
        self.best_match(url, Some(http_method), parameter)
    }

    /// Best match under loose rules: the HTTP method is ignored.
    pub fn find_best_match_loose(&self, url: &str, parameter: Option<&str>) -> Option<&Endpoint> {
        self.best_match(url, None, parameter)
    }

    fn best_match(
        &self,
        url: &str,
        http_method: Option<&str>,
        parameter: Option<&str>,
    ) -> Option<&Endpoint> {
        let concrete = cleaner::canonicalize(url.split('?').next().unwrap_or(url));
        let case_insensitive = self.framework.case_insensitive_paths();

        let mut best: Option<&Endpoint> = None;
        let mut best_score = -1i64;
        for endpoint in &self.endpoints {
            for candidate in std::iter::once(endpoint).chain(endpoint.variants.iter()) {
                if let Some(method) = http_method {
                    if !candidate.http_method.eq_ignore_ascii_case(method) {
                        continue;
                    }
                }
                let mut score = relevance_score(&candidate.url_path, &concrete, case_insensitive);
                if score < 0 {
                    continue;
                }
                if let Some(name) = parameter {
                    if candidate.has_parameter(name) {
                        score += PARAMETER_BONUS;
                    }
                }
                // strictly greater wins; an equal score keeps the earlier candidate
                if score > best_score {
                    best_score = score;
                    best = Some(candidate);
                }
            }
        }
        if let Some(found) = best {
            debug!(
                url = concrete,
                matched = found.url_path,
                score = best_score,
                "matched endpoint"
            );
        }
        best
    }
}

/// Scores one candidate template against a concrete path. Returns -1 when
/// the candidate cannot match. A parametric segment matches anything and
/// contributes the concrete segment's length; a literal segment must match
/// exactly and scores double that length, so literals dominate placeholders.
/// An extension segment like `*.do` matches any segment carrying the suffix
/// and scores like a placeholder.
pub fn relevance_score(candidate: &str, concrete: &str, case_insensitive: bool) -> i64 {
    let candidate_segments: Vec<&str> = candidate.split('/').filter(|s| !s.is_empty()).collect();
    let concrete_segments: Vec<&str> = concrete.split('/').filter(|s| !s.is_empty()).collect();
    if candidate_segments.len() != concrete_segments.len() {
        return -1;
    }
    let mut score = 0i64;
    for (expected, found) in candidate_segments.iter().zip(&concrete_segments) {
        if cleaner::is_placeholder_segment(expected) {
            score += found.len() as i64 + SEGMENT_BONUS;
        } else if let Some(suffix) = expected.strip_prefix('*') {
            if !found.ends_with(suffix) {
                return -1;
            }
            score += found.len() as i64 + SEGMENT_BONUS;
        } else if segments_equal(expected, found, case_insensitive) {
            score += 2 * found.len() as i64 + SEGMENT_BONUS;
        } else {
            return -1;
        }
    }
    score
}

fn segments_equal(expected: &str, found: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        expected.eq_ignore_ascii_case(found)
    } else {
        expected == found
    }
}

fn clean_paths(endpoint: &mut Endpoint, path_cleaner: &PathCleaner) {
    endpoint.url_path = path_cleaner.clean(&endpoint.url_path);
    for variant in &mut endpoint.variants {
        clean_paths(variant, path_cleaner);
    }
}

/// Collapses endpoints sharing a declaration site into one primary with the
/// remainder as variants. Insertion order decides the primary.
pub fn rectify_variant_hierarchy(raw: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut out: Vec<Endpoint> = Vec::new();

    for endpoint in raw {
        match out.iter().position(|e| e.same_declaration_site(&endpoint)) {
            Some(primary_index) => fold_into(&mut out[primary_index], endpoint),
            None => out.push(endpoint),
        }
    }

    for endpoint in &mut out {
        merge_group_parameters(endpoint);
    }
    out
}

/// Attaches `incoming` (and its own variants) under `primary`, merging
/// parameters instead when the method already exists in the group.
fn fold_into(primary: &mut Endpoint, incoming: Endpoint) {
    let mut queue = vec![incoming];
    while let Some(mut next) = queue.pop() {
        queue.append(&mut next.variants);
        if next.http_method.eq_ignore_ascii_case(&primary.http_method) {
            for parameter in next.parameters.into_values() {
                primary.add_parameter(parameter);
            }
            continue;
        }
        if let Some(existing) = primary
            .variants
            .iter_mut()
            .find(|v| v.http_method.eq_ignore_ascii_case(&next.http_method))
        {
            for parameter in next.parameters.into_values() {
                existing.add_parameter(parameter);
            }
            continue;
        }
        primary.add_variant(next);
    }
}

/// Unifies parameter detections across one variant group: every member ends
/// up with the union of parameters, typed detections preferred.
fn merge_group_parameters(primary: &mut Endpoint) {
    let mut union: Vec<RouteParameter> = Vec::new();
    for member in std::iter::once(&*primary).chain(primary.variants.iter()) {
        for parameter in member.parameters.values() {
            match union
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&parameter.name))
            {
                Some(existing) => existing.absorb(parameter),
                None => union.push(parameter.clone()),
            }
        }
    }
    for parameter in &union {
        primary.add_parameter(parameter.clone());
    }
    for variant in &mut primary.variants {
        for parameter in &union {
            variant.add_parameter(parameter.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParamDataType, ParamType};

    fn database(endpoints: Vec<Endpoint>) -> EndpointDatabase {
        EndpointDatabase::new(FrameworkType::SpringMvc, endpoints, &PathCleaner::default())
    }

    #[test]
    fn literal_segment_beats_placeholder() {
        let db = database(vec![
            Endpoint::new("/users/{id}", "GET", "users.java"),
            Endpoint::new("/users/active", "GET", "users.java"),
        ]);
        let hit = db.find_best_match("/users/active", "GET", None);
        assert_eq!(hit.map(|e| e.url_path.as_str()), Some("/users/active"));
    }

    #[test]
    fn placeholder_matches_any_segment() {
        let db = database(vec![Endpoint::new("/users/{id}", "GET", "users.java")]);
        let hit = db.find_best_match("/users/42", "GET", None);
        assert!(hit.is_some());
        assert!(db.find_best_match("/users/42/extra", "GET", None).is_none());
    }

    #[test]
    fn wildcard_and_extension_mappings_match() {
        let db = EndpointDatabase::new(
            FrameworkType::Jsp,
            vec![
                Endpoint::new("/reports/*", "GET", "report.jsp"),
                Endpoint::new("/*.do", "GET", "actions.java"),
            ],
            &PathCleaner::default(),
        );
        let report = db.find_best_match("/reports/monthly", "GET", None).unwrap();
        assert_eq!(report.file_path, "report.jsp");
        let action = db.find_best_match("/login.do", "GET", None).unwrap();
        assert_eq!(action.file_path, "actions.java");
        assert!(db.find_best_match("/login.jsp", "GET", None).is_none());
    }

    #[test]
    fn empty_database_returns_none() {
        let db = database(Vec::new());
        assert!(db.find_best_match("/anything", "GET", None).is_none());
    }

    #[test]
    fn strict_matching_filters_by_method() {
        let db = database(vec![Endpoint::new("/items", "POST", "items.java")]);
        assert!(db.find_best_match("/items", "GET", None).is_none());
        assert!(db.find_best_match_loose("/items", None).is_some());
    }

    #[test]
    fn equal_scores_keep_first_candidate() {
        let db = database(vec![
            Endpoint::new("/a/{x}", "GET", "first.java"),
            Endpoint::new("/a/{y}", "GET", "second.java"),
        ]);
        let hit = db.find_best_match("/a/val", "GET", None).unwrap();
        assert_eq!(hit.file_path, "first.java");
    }

    #[test]
    fn parameter_presence_breaks_ties() {
        let mut with_param = Endpoint::new("/b/{x}", "GET", "second.java");
        with_param.add_parameter(RouteParameter::query("q"));
        let db = database(vec![
            Endpoint::new("/b/{x}", "GET", "first.java"),
            with_param,
        ]);
        let hit = db.find_best_match("/b/val", "GET", Some("q")).unwrap();
        assert_eq!(hit.file_path, "second.java");
    }

    #[test]
    fn same_site_endpoints_collapse_to_variants() {
        let db = database(vec![
            Endpoint::new("/orders", "GET", "orders.rb"),
            Endpoint::new("/orders", "POST", "orders.rb"),
            Endpoint::new("/orders", "PUT", "orders.rb"),
        ]);
        assert_eq!(db.endpoints().len(), 1);
        let primary = &db.endpoints()[0];
        assert_eq!(primary.http_method, "GET");
        assert_eq!(primary.variants.len(), 2);
    }

    #[test]
    fn group_parameters_unify_with_typed_preference() {
        let mut first = Endpoint::new("/p", "GET", "p.java");
        first.add_parameter(RouteParameter::new("id", ParamType::Unknown));
        let mut second = Endpoint::new("/p", "POST", "p.java");
        second.add_parameter(
            RouteParameter::path_variable("id").with_data_type(ParamDataType::Integer),
        );
        let db = database(vec![first, second]);
        let primary = &db.endpoints()[0];
        let merged = &primary.parameters["id"];
        assert_eq!(merged.param_type, ParamType::PathVariable);
        assert_eq!(merged.data_type, ParamDataType::Integer);
        assert!(primary.variants[0].has_parameter("id"));
    }

    #[test]
    fn matches_can_land_on_variants() {
        let mut primary = Endpoint::new("/v", "GET", "v.rb");
        primary.add_variant(Endpoint::new("/v", "DELETE", "v.rb"));
        let db = database(vec![primary]);
        let hit = db.find_best_match("/v", "DELETE", None).unwrap();
        assert_eq!(hit.http_method, "DELETE");
    }

    #[test]
    fn reverse_lookup_by_file() {
        let db = database(vec![Endpoint::new("/x", "GET", "src/X.java")]);
        assert_eq!(db.endpoints_for_file("SRC/x.JAVA").map(|v| v.len()), Some(1));
        assert!(db.endpoints_for_file("other.java").is_none());
    }
}
