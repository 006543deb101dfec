//! `ansible-inventory --list --export` dump → host/group graph
//!
//! Every host belongs to `all`. Membership is transitive through
//! `children`. Effective host variables are built by applying the vars of
//! each containing group ordered by (depth from `all`, group name), then the
//! host's own vars; the last value applied wins.

use super::VarTable;
use crate::error::{OrchestratorError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const ALL_GROUP: &str = "all";
const META_KEY: &str = "_meta";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    pub name: String,
    /// Hosts listed directly on this group
    pub hosts: Vec<String>,
    pub children: Vec<String>,
    pub vars: VarTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRecord {
    pub name: String,
    /// Every group containing the host, in variable precedence order
    pub groups: Vec<String>,
    /// Effective variables after group and host overlays
    pub vars: VarTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryGraph {
    pub groups: BTreeMap<String, Group>,
    pub hosts: BTreeMap<String, HostRecord>,
}

impl InventoryGraph {
    pub fn find_host(&self, name: &str) -> Option<&HostRecord> {
        self.hosts.get(name)
    }

    /// All hosts in `group` or any of its descendants, sorted
    pub fn hosts_in(&self, group: &str) -> Vec<&str> {
        self.hosts
            .values()
            .filter(|h| h.groups.iter().any(|g| g == group))
            .map(|h| h.name.as_str())
            .collect()
    }
}

pub fn parse_inventory(raw: &str) -> Result<InventoryGraph> {
    let document: Value =
        serde_json::from_str(raw).map_err(|e| OrchestratorError::parse("inventory", e, raw))?;
    let Value::Object(sections) = &document else {
        return Err(OrchestratorError::parse("inventory", "top level is not an object", raw));
    };

    let mut host_vars: BTreeMap<String, VarTable> = BTreeMap::new();
    if let Some(meta) = sections.get(META_KEY) {
        let hostvars = meta.get("hostvars").cloned().unwrap_or(Value::Null);
        for (host, vars) in var_table(Some(&hostvars), "_meta.hostvars", raw)? {
            host_vars.insert(host.clone(), var_table(Some(&vars), &format!("hostvars.{}", host), raw)?);
        }
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for (name, section) in sections.iter().filter(|(k, _)| k.as_str() != META_KEY) {
        if !section.is_object() && !section.is_null() {
            return Err(OrchestratorError::parse(
                "inventory",
                format!("group '{}' is not an object", name),
                raw,
            ));
        }
        groups.insert(
            name.clone(),
            Group {
                name: name.clone(),
                hosts: string_list(section.get("hosts"), name, "hosts", raw)?,
                children: string_list(section.get("children"), name, "children", raw)?,
                vars: var_table(section.get("vars"), &format!("{}.vars", name), raw)?,
            },
        );
    }

    // Referenced children always exist, even when the dump omits empty ones
    let referenced: Vec<String> = groups.values().flat_map(|g| g.children.clone()).collect();
    for name in referenced.into_iter().chain(std::iter::once(ALL_GROUP.to_string())) {
        groups.entry(name.clone()).or_insert_with(|| Group {
            name,
            ..Group::default()
        });
    }

    if let Some(group) = find_cycle(&groups) {
        return Err(OrchestratorError::parse(
            "inventory",
            format!("group cycle through '{}'", group),
            raw,
        ));
    }

    let mut parents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for group in groups.values() {
        for child in &group.children {
            parents.entry(child.as_str()).or_default().push(group.name.as_str());
        }
    }

    let mut depths = HashMap::new();
    for name in groups.keys() {
        depth_of(name, &parents, &mut depths);
    }

    let mut host_names: BTreeSet<&str> = host_vars.keys().map(String::as_str).collect();
    host_names.extend(groups.values().flat_map(|g| g.hosts.iter().map(String::as_str)));

    let mut hosts = BTreeMap::new();
    for host in host_names {
        let mut containing: BTreeSet<&str> = BTreeSet::from([ALL_GROUP]);
        for group in groups.values().filter(|g| g.hosts.iter().any(|h| h == host)) {
            collect_ancestors(group.name.as_str(), &parents, &mut containing);
        }

        let mut ordered: Vec<&str> = containing.into_iter().collect();
        ordered.sort_by_key(|g| (depths.get(g).copied().unwrap_or(0), *g));

        let mut vars = VarTable::new();
        for group in &ordered {
            if let Some(group) = groups.get(*group) {
                vars.extend(group.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        if let Some(own) = host_vars.get(host) {
            vars.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        hosts.insert(
            host.to_string(),
            HostRecord {
                name: host.to_string(),
                groups: ordered.into_iter().map(str::to_string).collect(),
                vars,
            },
        );
    }

    Ok(InventoryGraph { groups, hosts })
}

fn string_list(value: Option<&Value>, group: &str, field: &str, raw: &str) -> Result<Vec<String>> {
    let wrong_type = || {
        OrchestratorError::parse(
            "inventory",
            format!("{}.{} must be a list of names", group, field),
            raw,
        )
    };
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong_type))
            .collect(),
        Some(_) => Err(wrong_type()),
    }
}

fn var_table(value: Option<&Value>, location: &str, raw: &str) -> Result<VarTable> {
    match value {
        None | Some(Value::Null) => Ok(VarTable::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(_) => Err(OrchestratorError::parse(
            "inventory",
            format!("{} must be a mapping", location),
            raw,
        )),
    }
}

/// Name of a group sitting on a `children` cycle, if any
fn find_cycle(groups: &BTreeMap<String, Group>) -> Option<String> {
    #[derive(PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        groups: &'a BTreeMap<String, Group>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<String> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => return Some(name.to_string()),
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        if let Some(group) = groups.get(name) {
            for child in &group.children {
                if let Some(found) = visit(child, groups, marks) {
                    return Some(found);
                }
            }
        }
        marks.insert(name, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    groups.keys().find_map(|name| visit(name, groups, &mut marks))
}

/// Longest path from `all`; groups without a parent hang directly off `all`
fn depth_of<'a>(
    name: &'a str,
    parents: &BTreeMap<&'a str, Vec<&'a str>>,
    memo: &mut HashMap<&'a str, usize>,
) -> usize {
    if name == ALL_GROUP {
        memo.insert(name, 0);
        return 0;
    }
    if let Some(depth) = memo.get(name) {
        return *depth;
    }
    let deepest_parent = parents
        .get(name)
        .map(|ps| ps.iter().map(|p| depth_of(*p, parents, memo)).max().unwrap_or(0))
        .unwrap_or(0);
    memo.insert(name, deepest_parent + 1);
    deepest_parent + 1
}

fn collect_ancestors<'a>(name: &'a str, parents: &BTreeMap<&'a str, Vec<&'a str>>, out: &mut BTreeSet<&'a str>) {
    if !out.insert(name) {
        return;
    }
    for parent in parents.get(name).into_iter().flatten() {
        collect_ancestors(*parent, parents, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> String {
        json!({
            "_meta": {
                "hostvars": {
                    "web01": {"http_port": 8443, "ansible_host": "10.0.0.11"},
                    "db01": {}
                }
            },
            "all": {
                "children": ["ungrouped", "production"],
                "vars": {"http_port": 80, "ntp": "pool.ntp.org"}
            },
            "production": {
                "children": ["webservers", "dbservers"],
                "vars": {"env": "prod", "tier": "base"}
            },
            "webservers": {
                "hosts": ["web01", "web02"],
                "vars": {"http_port": 8080, "tier": "frontend"}
            },
            "dbservers": {"hosts": ["db01"]},
            "ungrouped": {}
        })
        .to_string()
    }

    #[test]
    fn test_host_var_beats_group_var() {
        let graph = parse_inventory(&sample()).unwrap();
        let web01 = graph.find_host("web01").unwrap();
        assert_eq!(web01.vars["http_port"], json!(8443));

        let web02 = graph.find_host("web02").unwrap();
        assert_eq!(web02.vars["http_port"], json!(8080));
    }

    #[test]
    fn test_deeper_group_wins() {
        let graph = parse_inventory(&sample()).unwrap();
        let web02 = graph.find_host("web02").unwrap();
        assert_eq!(web02.vars["tier"], json!("frontend"));
        assert_eq!(web02.vars["env"], json!("prod"));
        assert_eq!(web02.vars["ntp"], json!("pool.ntp.org"));
        assert_eq!(web02.groups, vec!["all", "production", "webservers"]);
    }

    #[test]
    fn test_membership_is_transitive() {
        let graph = parse_inventory(&sample()).unwrap();
        assert_eq!(graph.hosts_in("production"), vec!["db01", "web01", "web02"]);
        assert_eq!(graph.hosts_in("webservers"), vec!["web01", "web02"]);
        assert_eq!(graph.hosts_in("all").len(), 3);
    }

    #[test]
    fn test_host_only_in_hostvars_is_in_all() {
        let raw = json!({"_meta": {"hostvars": {"lonely": {"x": 1}}}}).to_string();
        let graph = parse_inventory(&raw).unwrap();
        assert_eq!(graph.find_host("lonely").unwrap().groups, vec!["all"]);
        assert!(graph.groups.contains_key("all"));
    }

    #[test]
    fn test_same_depth_applied_by_name() {
        let raw = json!({
            "all": {"children": ["alpha", "beta"]},
            "alpha": {"hosts": ["h"], "vars": {"role": "alpha"}},
            "beta": {"hosts": ["h"], "vars": {"role": "beta"}}
        })
        .to_string();
        let graph = parse_inventory(&raw).unwrap();
        assert_eq!(graph.find_host("h").unwrap().vars["role"], json!("beta"));
    }

    #[test]
    fn test_all_applied_before_groups_sorting_ahead_of_it() {
        let raw = json!({
            "all": {"children": ["Admins", "abc"], "vars": {"x": "from_all", "shared": "all"}},
            "Admins": {"hosts": ["h1"], "vars": {"x": "from_Admins"}},
            "abc": {"hosts": ["h2"], "vars": {"x": "from_abc"}}
        })
        .to_string();
        let graph = parse_inventory(&raw).unwrap();

        let h1 = graph.find_host("h1").unwrap();
        assert_eq!(h1.vars["x"], json!("from_Admins"));
        assert_eq!(h1.vars["shared"], json!("all"));
        assert_eq!(h1.groups, vec!["all", "Admins"]);

        let h2 = graph.find_host("h2").unwrap();
        assert_eq!(h2.vars["x"], json!("from_abc"));
        assert_eq!(h2.groups, vec!["all", "abc"]);
    }

    #[test]
    fn test_cycle_rejected() {
        let raw = json!({
            "all": {"children": ["a"]},
            "a": {"children": ["b"]},
            "b": {"children": ["a"], "hosts": ["h"]}
        })
        .to_string();
        let err = parse_inventory(&raw).unwrap_err();
        assert_eq!(err.kind(), "parse_error");
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_wrong_types_rejected() {
        for raw in [
            r#"{"web": {"hosts": "web01"}}"#,
            r#"{"web": {"vars": [1, 2]}}"#,
            r#"{"web": 3}"#,
            r#"["all"]"#,
            "ERROR! no inventory",
        ] {
            assert_eq!(parse_inventory(raw).unwrap_err().kind(), "parse_error", "{}", raw);
        }
    }
}
