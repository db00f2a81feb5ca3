use serde_json::Value;

/// Object paths probed, in order, when a payload is not a bare array.
///
/// When a payload satisfies more than one shape the earliest entry wins. That ordering is an
/// assumption: upstreams never send two of these at once in practice, and nothing documents
/// which one would be authoritative.
pub const LIST_PATHS: [&[&str]; 9] = [
    &["data", "list"],
    &["data", "records"],
    &["data"],
    &["contentInfos"],
    &["dassi", "lspee"],
    &["subjectList"],
    &["items"],
    &["records"],
    &["list"],
];

/// Extract the item list from any of the known envelope shapes. Unknown shapes yield `&[]`.
pub fn unwrap_list(payload: &Value) -> &[Value] {
    if let Value::Array(items) = payload {
        return items;
    }

    LIST_PATHS
        .iter()
        .find_map(|path| lookup(payload, path).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |node, key| node.get(*key))
}
