use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use odata_client::{
    Batch, BatchPartError, Changeset, Config, Error, Filter, HttpRequest, HttpResponse, Key,
    LastCallObserver, Method, NavigationValue, ODataVersion, Outcome, SapGatewayErrorParser,
    Service, SlotResult, Transport, TransportError, Value,
};
use pretty_assertions::assert_eq;

const ROOT: &str = "http://example.com/sap/opu/odata/EPM";
const EPM: &str = include_str!("fixtures/sap_epm_v2.xml");
const CARS: &str = include_str!("fixtures/cars_v4.xml");

/// Answers queued responses in order and records every request
#[derive(Default)]
struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    fn respond(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Connection(format!("no response queued for {url}")))
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn json(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("Content-Type", "application/json")
        .with_body(body)
}

fn metadata(document: &str) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("Content-Type", "application/xml;charset=utf-8")
        .with_body(document)
}

async fn connect(transport: &Arc<MockTransport>, document: &str, version: ODataVersion) -> Service {
    transport.respond(metadata(document));
    Service::connect(format!("{ROOT}/"), transport.clone(), Config::new(version))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_connect_and_get_entity() {
    init_logging();
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, EPM, ODataVersion::V2).await;
    assert_eq!(service.url(), ROOT);

    transport.respond(json(
        200,
        r#"{"d": {"ID": 23, "NameFirst": "Rob", "NameLast": "Ickes",
                  "Salary": "4500.50", "StartDate": "/Date(1514140205000)/"}}"#,
    ));
    let request = service
        .entity_set("Employees")
        .unwrap()
        .get_entity(Key::single(23))
        .unwrap()
        .select(["NameFirst", "NameLast", "Salary", "StartDate"])
        .build()
        .unwrap();
    let employee = service.execute(&request).await.unwrap().into_entity().unwrap();

    assert_eq!(employee.get_as::<String>("NameLast").unwrap(), "Ickes");
    assert_eq!(employee.get("Salary").unwrap().to_string(), "4500.50");
    assert_eq!(employee.path(), Some("Employees(23)"));

    let sent = transport.requests();
    assert_eq!(sent[0].url, format!("{ROOT}/$metadata"));
    assert_eq!(
        sent[1].url,
        format!("{ROOT}/Employees(23)?$select=NameFirst%2CNameLast%2CSalary%2CStartDate")
    );
    assert_eq!(sent[1].header("DataServiceVersion"), Some("2.0"));
    assert_eq!(sent[1].method, Method::Get);
}

#[tokio::test]
async fn test_metadata_request_failure() {
    let transport = Arc::new(MockTransport::default());
    transport.respond(json(404, r#"{"error": {"message": "no such service"}}"#));
    let error = Service::connect(ROOT, transport.clone(), Config::new(ODataVersion::V2))
        .await
        .unwrap_err();
    let Error::Http(error) = error else {
        panic!("expected an HTTP error, got {error:?}");
    };
    assert!(error.message.starts_with("Metadata request failed"));
    assert_eq!(error.status(), 404);

    // a 200 that is not XML is rejected as well
    transport.respond(json(200, "{}"));
    assert!(matches!(
        Service::connect(ROOT, transport, Config::new(ODataVersion::V2)).await,
        Err(Error::Http(_))
    ));
}

#[tokio::test]
async fn test_query_with_inline_count_and_deferred_navigation() {
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, EPM, ODataVersion::V2).await;

    transport.respond(json(
        200,
        r#"{"d": {"__count": "1", "results": [
            {"ID": 23, "NameFirst": "Rob",
             "Addresses": {"__deferred": {"uri": "http://example.com/Employees(23)/Addresses"}}}
        ]}}"#,
    ));
    let request = service
        .entity_set("Employees")
        .unwrap()
        .get_entities()
        .unwrap()
        .filter(Filter::eq("NameFirst", "Rob"))
        .inline_count()
        .build()
        .unwrap();
    let Outcome::Entities {
        entities, count, ..
    } = service.execute(&request).await.unwrap()
    else {
        panic!("expected a collection");
    };
    assert_eq!(count, Some(1));
    assert!(!entities[0].is_expanded("Addresses"));

    transport.respond(json(
        200,
        r#"{"d": {"results": [{"ID": 456, "Street": "Baker Street", "City": "London"}]}}"#,
    ));
    let NavigationValue::Many(addresses) = service
        .fetch_navigation(&entities[0], "Addresses")
        .await
        .unwrap()
    else {
        panic!("Addresses is a collection");
    };
    assert_eq!(addresses[0].get_as::<String>("City").unwrap(), "London");
    assert_eq!(
        transport.requests().last().map(|r| r.url.clone()),
        Some(format!("{ROOT}/Employees(23)/Addresses"))
    );
}

#[tokio::test]
async fn test_http_error_carries_gateway_details() {
    let transport = Arc::new(MockTransport::default());
    let observer = Arc::new(LastCallObserver::new());
    let service = connect(&transport, EPM, ODataVersion::V2)
        .await
        .with_error_parser(Arc::new(SapGatewayErrorParser))
        .with_observer(observer.clone());

    transport.respond(json(
        404,
        r#"{"error": {"code": "SY/530", "message": {"lang": "en", "value": "Resource not found"}}}"#,
    ));
    let request = service
        .entity_set("Employees")
        .unwrap()
        .get_entity(Key::single(99))
        .unwrap()
        .build()
        .unwrap();
    let Err(Error::Http(error)) = service.execute(&request).await else {
        panic!("expected an HTTP error");
    };
    assert_eq!(
        error.message,
        "HTTP GET Employees(99) failed with status code 404: Resource not found"
    );
    assert_eq!(
        error.details.as_ref().and_then(|d| d.code.as_deref()),
        Some("SY/530")
    );
    assert_eq!(observer.response().map(|r| r.status), Some(404));
    assert_eq!(
        observer.request().map(|r| r.url),
        Some(format!("{ROOT}/Employees(99)"))
    );
}

#[tokio::test]
async fn test_function_import_and_count() {
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, EPM, ODataVersion::V2).await;

    transport.respond(json(200, r#"{"d": {"sum": 6}}"#));
    let request = service
        .function("sum")
        .unwrap()
        .parameter("A", 2)
        .parameter("B", 4)
        .build()
        .unwrap();
    let value = service.execute(&request).await.unwrap().into_value().unwrap();
    assert_eq!(value, Value::Int32(6));
    assert_eq!(
        transport.requests().last().map(|r| r.url.clone()),
        Some(format!("{ROOT}/sum?A=2&B=4"))
    );

    transport.respond(
        HttpResponse::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body("23"),
    );
    let request = service
        .entity_set("Employees")
        .unwrap()
        .count()
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(service.execute(&request).await.unwrap().into_count().unwrap(), 23);
}

#[tokio::test]
async fn test_batch_round_trip() {
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, EPM, ODataVersion::V2).await;
    let employees = service.entity_set("Employees").unwrap();

    let batch = Batch::with_id("r1")
        .request(
            employees
                .get_entity(Key::single(23))
                .unwrap()
                .build()
                .unwrap(),
        )
        .changeset(
            Changeset::with_id("1").request(
                employees
                    .update_entity(Key::single(23))
                    .unwrap()
                    .set("Age", 41)
                    .build()
                    .unwrap(),
            ),
        );

    let body = [
        "--batch_r1",
        "Content-Type: application/http",
        "Content-Transfer-Encoding: binary",
        "",
        "HTTP/1.1 200 OK",
        "Content-Type: application/json",
        "",
        r#"{"d": {"ID": 23, "NameFirst": "Rob"}}"#,
        "--batch_r1",
        "Content-Type: multipart/mixed; boundary=changeset_1",
        "",
        "--changeset_1",
        "Content-Type: application/http",
        "Content-Transfer-Encoding: binary",
        "",
        "HTTP/1.1 204 No Content",
        "",
        "",
        "--changeset_1--",
        "--batch_r1--",
    ]
    .join("\r\n");
    transport.respond(
        HttpResponse::new(202)
            .with_header("Content-Type", "multipart/mixed; boundary=batch_r1")
            .with_body(body),
    );

    let results = service.execute_batch(&batch).await.unwrap();
    assert_eq!(results.len(), 2);
    let Some(Ok(Outcome::Entity(employee))) = results[0].clone().into_single() else {
        panic!("first slot should hold the employee");
    };
    assert_eq!(employee.get_as::<i32>("ID").unwrap(), 23);
    assert_eq!(
        results[1],
        SlotResult::Changeset(Ok(vec![Ok(Outcome::Empty)]))
    );

    let sent = transport.requests().pop().unwrap();
    assert_eq!(sent.url, format!("{ROOT}/$batch"));
    assert_eq!(
        sent.header("Content-Type"),
        Some("multipart/mixed;boundary=batch_r1")
    );
    assert!(sent.body_text().contains("MERGE") || sent.body_text().contains("PATCH"));
}

#[tokio::test]
async fn test_batch_rejected_as_a_whole() {
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, EPM, ODataVersion::V2).await;
    let batch = Batch::new().request(
        service
            .entity_set("Employees")
            .unwrap()
            .get_entity(Key::single(1))
            .unwrap()
            .build()
            .unwrap(),
    );
    transport.respond(json(400, r#"{"error": {"message": "bad batch"}}"#));
    let Err(Error::Http(error)) = service.execute_batch(&batch).await else {
        panic!("expected an HTTP error");
    };
    assert_eq!(error.status(), 400);
    assert!(error.message.contains(batch.id()));
}

#[tokio::test]
async fn test_v4_create_and_missing_part() {
    let transport = Arc::new(MockTransport::default());
    let service = connect(&transport, CARS, ODataVersion::V4).await;
    let cars = service.entity_set("Cars").unwrap();

    let create = cars
        .create_entity()
        .unwrap()
        .set("ID", 9)
        .set("Model", "Enyaq")
        .bind("Manufacturer", "Manufacturers(3)")
        .build()
        .unwrap();
    transport.respond(json(201, r#"{"ID": 9, "Model": "Enyaq"}"#));
    let created = service.execute(&create).await.unwrap().into_entity().unwrap();
    assert_eq!(created.path(), Some("Cars(9)"));
    let sent = transport.requests().pop().unwrap();
    assert_eq!(sent.method, Method::Post);
    assert_eq!(sent.header("OData-Version"), Some("4.0"));
    let body: serde_json::Value = serde_json::from_str(&sent.body_text()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"ID": 9, "Model": "Enyaq", "Manufacturer@odata.bind": "Manufacturers(3)"})
    );

    let batch = Batch::with_id("b")
        .request(cars.get_entity(Key::single(1)).unwrap().build().unwrap())
        .request(cars.get_entity(Key::single(2)).unwrap().build().unwrap());
    transport.respond(
        HttpResponse::new(200)
            .with_header("Content-Type", "multipart/mixed;boundary=batch_b")
            .with_body(
                [
                    "--batch_b",
                    "Content-Type: application/http",
                    "",
                    "HTTP/1.1 200 OK",
                    "Content-Type: application/json",
                    "",
                    r#"{"ID": 1}"#,
                    "--batch_b--",
                ]
                .join("\r\n"),
            ),
    );
    let results = service.execute_batch(&batch).await.unwrap();
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        SlotResult::Single(Err(BatchPartError::Missing { index: 1 }))
    );
}
