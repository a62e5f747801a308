//! JSON shapes of the vSphere VI/JSON API that the client reads and writes.

use crate::domain::{DynamicProperty, ManagedObjectRef, ObjectContent, RawValue};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectRef,
    pub property_collector: ManagedObjectRef,
    pub view_manager: ManagedObjectRef,
    pub session_manager: ManagedObjectRef,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrieveResult {
    pub token: Option<String>,
    #[serde(default)]
    pub objects: Vec<WireObjectContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireObjectContent {
    pub obj: ManagedObjectRef,
    #[serde(default)]
    pub prop_set: Vec<WireProperty>,
}

#[derive(Debug, Deserialize)]
pub struct WireProperty {
    pub name: String,
    #[serde(default)]
    pub val: Value,
}

impl From<WireObjectContent> for ObjectContent {
    fn from(wire: WireObjectContent) -> Self {
        Self {
            obj: wire.obj,
            properties: wire
                .prop_set
                .into_iter()
                .map(|p| DynamicProperty::new(p.name, decode_value(&p.val)))
                .collect(),
        }
    }
}

pub fn moref(r: &ManagedObjectRef) -> Value {
    json!({
        "_typeName": "ManagedObjectReference",
        "type": r.kind,
        "value": r.value,
    })
}

/// Selects `paths` of every `kind` object visible through the container `view`.
pub fn property_filter_spec(view: &ManagedObjectRef, kind: &str, paths: &[String]) -> Value {
    json!({
        "specSet": [{
            "_typeName": "PropertyFilterSpec",
            "propSet": [{
                "_typeName": "PropertySpec",
                "type": kind,
                "pathSet": paths,
            }],
            "objectSet": [{
                "_typeName": "ObjectSpec",
                "obj": moref(view),
                "skip": true,
                "selectSet": [{
                    "_typeName": "TraversalSpec",
                    "name": "traverseEntities",
                    "type": "ContainerView",
                    "path": "view",
                    "skip": false,
                }],
            }],
        }],
        "options": {
            "_typeName": "RetrieveOptions",
        },
    })
}

/// Values in `anyType` positions arrive wrapped as `{"_typeName": .., "_value": ..}`;
/// data objects arrive as plain objects tagged with `_typeName`.
pub fn decode_value(val: &Value) -> RawValue {
    match val {
        Value::Bool(b) => RawValue::Bool(*b),
        Value::Number(n) => decode_number(n),
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Object(map) => {
            let type_name = map
                .get("_typeName")
                .and_then(Value::as_str)
                .unwrap_or("object");

            match (type_name, map.get("_value")) {
                ("dateTime", Some(Value::String(s))) => match s.parse::<DateTime<Utc>>() {
                    Ok(ts) => RawValue::Timestamp(ts),
                    Err(_) => RawValue::Text(s.clone()),
                },
                ("float" | "double", Some(Value::Number(n))) => {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
                (_, Some(inner)) => decode_value(inner),
                (_, None) => RawValue::Data {
                    type_name: type_name.to_owned(),
                    fields: map
                        .iter()
                        .filter(|(key, _)| key.as_str() != "_typeName")
                        .map(|(key, value)| DynamicProperty::new(key.as_str(), decode_value(value)))
                        .collect(),
                },
            }
        }
        Value::Array(items) => RawValue::List(items.iter().map(decode_value).collect()),
        Value::Null => RawValue::Unsupported("null".to_owned()),
    }
}

fn decode_number(n: &serde_json::Number) -> RawValue {
    match n.as_i64() {
        Some(i) => RawValue::Int(i),
        None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_wrapped_primitives() {
        assert_eq!(
            decode_value(&json!({"_typeName": "int", "_value": 1234})),
            RawValue::Int(1234)
        );
        assert_eq!(
            decode_value(&json!({"_typeName": "long", "_value": 68719476736i64})),
            RawValue::Int(68719476736)
        );
        assert_eq!(
            decode_value(&json!({"_typeName": "double", "_value": 3})),
            RawValue::Float(3.0)
        );
        assert_eq!(
            decode_value(&json!({"_typeName": "boolean", "_value": true})),
            RawValue::Bool(true)
        );
        assert_eq!(
            decode_value(&json!({"_typeName": "HostSystemPowerState", "_value": "poweredOn"})),
            RawValue::Text("poweredOn".into())
        );
    }

    #[test]
    fn test_decode_timestamp() {
        let raw = decode_value(&json!({
            "_typeName": "dateTime",
            "_value": "2024-03-04T05:06:07.123Z",
        }));
        let expected = Utc.timestamp_millis_opt(1709528767123).unwrap();

        assert_eq!(raw, RawValue::Timestamp(expected));
    }

    #[test]
    fn test_decode_data_object() {
        let raw = decode_value(&json!({
            "_typeName": "HostHardwareSummary",
            "vendor": "Dell Inc.",
            "cpuMhz": 2400,
        }));

        assert_eq!(raw.kind(), "data");
        assert_eq!(raw.to_string(), "<HostHardwareSummary>");
        assert_eq!(raw.field("vendor"), Some(&RawValue::Text("Dell Inc.".into())));
        assert_eq!(raw.field("cpuMhz"), Some(&RawValue::Int(2400)));
        assert_eq!(raw.field("_typeName"), None);
    }

    #[test]
    fn test_decode_scsi_lun_array() {
        let raw = decode_value(&json!({
            "_typeName": "ArrayOfScsiLun",
            "_value": [{
                "_typeName": "HostScsiDisk",
                "deviceName": "/vmfs/devices/disks/naa.600508b1001c",
                "operationalState": ["ok"],
            }, {
                "_typeName": "ScsiLun",
                "deviceName": "/vmfs/devices/cdrom/mpx.vmhba32",
                "operationalState": ["degraded", "ok"],
            }],
        }));

        let luns = raw.as_list().unwrap();
        assert_eq!(luns.len(), 2);
        assert_eq!(
            luns[0].field("deviceName").and_then(RawValue::as_text),
            Some("/vmfs/devices/disks/naa.600508b1001c")
        );
        assert_eq!(
            luns[1].field("operationalState"),
            Some(&RawValue::List(vec![
                RawValue::Text("degraded".into()),
                RawValue::Text("ok".into()),
            ]))
        );
    }

    #[test]
    fn test_decode_plain_values() {
        assert_eq!(decode_value(&json!(42)), RawValue::Int(42));
        assert_eq!(decode_value(&json!(0.5)), RawValue::Float(0.5));
        assert_eq!(decode_value(&json!("esx01")), RawValue::Text("esx01".into()));
    }

    #[test]
    fn test_retrieve_result_into_objects() {
        let result: RetrieveResult = serde_json::from_value(json!({
            "_typeName": "RetrieveResult",
            "token": "1",
            "objects": [{
                "_typeName": "ObjectContent",
                "obj": {"_typeName": "ManagedObjectReference", "type": "HostSystem", "value": "host-10"},
                "propSet": [
                    {"_typeName": "DynamicProperty", "name": "name", "val": {"_typeName": "string", "_value": "esx01"}},
                    {"_typeName": "DynamicProperty", "name": "summary.hardware.numCpuCores", "val": {"_typeName": "short", "_value": 16}},
                ],
            }],
        }))
        .unwrap();

        assert_eq!(result.token.as_deref(), Some("1"));

        let objects = result
            .objects
            .into_iter()
            .map(ObjectContent::from)
            .collect::<Vec<_>>();

        assert_eq!(objects[0].obj, ManagedObjectRef::new("HostSystem", "host-10"));
        assert_eq!(objects[0].property("name"), Some(&RawValue::Text("esx01".into())));
        assert_eq!(
            objects[0].property("summary.hardware.numCpuCores"),
            Some(&RawValue::Int(16))
        );
    }

    #[test]
    fn test_property_filter_spec() {
        let view = ManagedObjectRef::new("ContainerView", "session[52ab]view-1");
        let spec = property_filter_spec(&view, "Datastore", &["name".to_owned()]);

        assert_eq!(spec["specSet"][0]["propSet"][0]["type"], "Datastore");
        assert_eq!(spec["specSet"][0]["propSet"][0]["pathSet"], json!(["name"]));
        assert_eq!(spec["specSet"][0]["objectSet"][0]["obj"]["value"], "session[52ab]view-1");
        assert_eq!(spec["specSet"][0]["objectSet"][0]["selectSet"][0]["path"], "view");
    }
}
