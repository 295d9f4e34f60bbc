//! Multipart encoding of a batch

use super::{Batch, BatchItem, Changeset};
use crate::query::{Expect, ODataRequest};
use crate::transport::Method;
use crate::version::ODataVersion;

const CRLF: &str = "\r\n";

fn push_request(lines: &mut Vec<String>, request: &ODataRequest, content_id: Option<usize>) {
    lines.push("Content-Type: application/http".to_string());
    lines.push("Content-Transfer-Encoding:binary".to_string());
    if let Some(id) = content_id {
        lines.push(format!("Content-ID: {id}"));
    }
    lines.push(String::new());

    lines.push(format!("{} {} HTTP/1.1", request.method, request.path_and_query()));
    for (name, value) in &request.headers {
        lines.push(format!("{name}: {value}"));
    }
    lines.push(String::new());
    // an empty body is still terminated by a blank line, SAP Gateway rejects the part otherwise
    lines.push(request.body.clone().unwrap_or_default());
}

fn encode_changeset(changeset: &Changeset) -> String {
    let boundary = changeset.boundary();
    let mut lines = vec![String::new()];
    for (position, request) in changeset.requests().iter().enumerate() {
        lines.push(format!("--{boundary}"));
        push_request(&mut lines, request, Some(position + 1));
    }
    lines.push(format!("--{boundary}--"));
    lines.join(CRLF)
}

impl Batch {
    /// `multipart/mixed` body with one part per slot
    pub fn encode(&self) -> String {
        let boundary = self.boundary();
        let mut lines = vec![String::new()];
        for item in &self.items {
            lines.push(format!("--{boundary}"));
            match item {
                BatchItem::Request(request) => push_request(&mut lines, request, None),
                BatchItem::Changeset(changeset) => {
                    lines.push(format!(
                        "Content-Type: multipart/mixed;boundary={}",
                        changeset.boundary()
                    ));
                    lines.push(String::new());
                    lines.push(encode_changeset(changeset));
                }
            }
        }
        lines.push(format!("--{boundary}--"));
        lines.join(CRLF)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/mixed;boundary={}", self.boundary())
    }

    /// The `POST $batch` request carrying this batch
    pub fn to_request(&self, version: ODataVersion) -> ODataRequest {
        let mut request =
            ODataRequest::for_version(version, Method::Post, "$batch".to_string(), Expect::Nothing);
        request
            .headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("Accept"));
        request
            .headers
            .push(("Content-Type".to_string(), self.content_type()));
        request.body = Some(self.encode());
        request.success = vec![202, 200];
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::model::Schema;
    use crate::query::RequestContext;
    use crate::query::builder::{EntityGetBuilder, EntityWriteBuilder, Target, WriteKind};
    use pretty_assertions::assert_eq;

    fn epm() -> (Schema, Config) {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(
            include_str!("../../tests/fixtures/sap_epm_v2.xml").as_bytes(),
            &config,
        )
        .unwrap();
        (schema, config)
    }

    fn target<'a>(schema: &'a Schema, path: &str) -> Target<'a> {
        let set = schema.entity_set("Employees").unwrap();
        Target {
            path: path.to_string(),
            entity_type: schema.entity_type_of(set).unwrap(),
            entity_set: Some(set.name.clone()),
        }
    }

    #[test]
    fn test_encode_request_and_changeset() {
        let (schema, config) = epm();
        let ctx = RequestContext::new(&schema, &config);
        let read = EntityGetBuilder::new(ctx, target(&schema, "Employees(23)"))
            .select(["NameFirst"])
            .build()
            .unwrap();
        let update = EntityWriteBuilder::new(ctx, target(&schema, "Employees(23)"), WriteKind::Update)
            .set("Age", 41)
            .method(Method::Merge)
            .build()
            .unwrap();

        let batch = Batch::with_id("1")
            .request(read)
            .changeset(Changeset::with_id("2").request(update));
        let expected = [
            "",
            "--batch_1",
            "Content-Type: application/http",
            "Content-Transfer-Encoding:binary",
            "",
            "GET Employees(23)?$select=NameFirst HTTP/1.1",
            "DataServiceVersion: 2.0",
            "MaxDataServiceVersion: 2.0",
            "Accept: application/json",
            "",
            "",
            "--batch_1",
            "Content-Type: multipart/mixed;boundary=changeset_2",
            "",
            "",
            "--changeset_2",
            "Content-Type: application/http",
            "Content-Transfer-Encoding:binary",
            "Content-ID: 1",
            "",
            "MERGE Employees(23) HTTP/1.1",
            "DataServiceVersion: 2.0",
            "MaxDataServiceVersion: 2.0",
            "Accept: application/json",
            "Content-Type: application/json",
            "",
            r#"{"Age":41}"#,
            "--changeset_2--",
            "--batch_1--",
        ]
        .join("\r\n");
        assert_eq!(batch.encode(), expected);

        let request = batch.to_request(ODataVersion::V2);
        assert_eq!(request.path, "$batch");
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.header("Content-Type"), Some("multipart/mixed;boundary=batch_1"));
        assert_eq!(request.header("Accept"), None);
        assert!(request.accepts(202));
    }
}
