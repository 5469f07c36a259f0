use soapkernel::mime::{MultipartRelated, Part};
use soapkernel::{Attachment, MimeFilter, SoapKernel, SoapRequest, SoapResponse, SoapVersion};
use std::sync::Arc;

const LOCATION: &str = "http://localhost:8080/ws";

fn kernel() -> SoapKernel {
    let mut kernel = SoapKernel::new();
    kernel.register_filter(Arc::new(MimeFilter::new()));
    kernel
}

/// Réponse multipart construite comme le ferait un serveur SwA
fn server_reply(envelope: &str, attachments: &[(&str, &[u8])]) -> SoapResponse {
    let mut package = MultipartRelated::new("text/xml");
    package.push(Part::new("text/xml; charset=utf-8", envelope).content_id("root@server"));
    for (id, content) in attachments {
        package.push(
            Part::new("application/octet-stream", content.to_vec())
                .content_id(id)
                .transfer_encoding("base64"),
        );
    }
    package.set_start("root@server");

    SoapResponse::new(
        package.to_bytes(),
        package.content_type(),
        LOCATION,
        "urn:Fetch",
        SoapVersion::Soap11,
    )
}

#[test]
fn test_attachments_flow_from_response_to_next_request() {
    let mut kernel = kernel();

    // Premier échange : pas de pièce jointe, la réponse en contient une
    let mut first = SoapRequest::new("<fetch/>", LOCATION, "urn:Fetch", SoapVersion::Soap11);
    kernel.filter_request(&mut first).unwrap();
    assert_eq!(first.content, b"<fetch/>");

    let mut reply = server_reply("<fetched/>", &[("ticket@server", &b"T-42"[..])]);
    kernel.filter_response(&mut reply).unwrap();
    assert_eq!(reply.content, b"<fetched/>");
    assert_eq!(reply.content_type, "text/xml; charset=utf-8");
    assert_eq!(kernel.attachments().len(), 1);

    // Deuxième échange : la pièce reçue part avec la requête suivante
    let mut second = SoapRequest::new("<confirm/>", LOCATION, "urn:Confirm", SoapVersion::Soap11);
    kernel.filter_request(&mut second).unwrap();

    assert!(second.content_type.starts_with("multipart/related"));
    let package = MultipartRelated::parse(&second.content, &second.content_type).unwrap();
    assert_eq!(package.root().unwrap().content, b"<confirm/>");
    let forwarded: Vec<_> = package.non_root_parts().collect();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].get_content_id().as_deref(), Some("ticket@server"));
    assert_eq!(forwarded[0].content, &b"T-42"[..]);

    assert!(kernel.attachments().is_empty());
}

#[test]
fn test_taken_attachment_is_not_forwarded() {
    let mut kernel = kernel();

    let mut reply = server_reply("<r/>", &[("a@server", &b"A"[..]), ("b@server", &b"B"[..])]);
    kernel.filter_response(&mut reply).unwrap();

    let taken = kernel.take_attachment("cid:a@server").unwrap();
    assert_eq!(taken.content, b"A");

    let mut next = SoapRequest::new("<n/>", LOCATION, "urn:Next", SoapVersion::Soap11);
    kernel.filter_request(&mut next).unwrap();

    assert!(!next.attachments.contains("a@server"));
    assert!(next.attachments.contains("b@server"));
}

#[test]
fn test_plain_response_clears_pending_attachments() {
    let mut kernel = kernel();
    kernel.add_attachment(Attachment::new("left@client", "text/plain", "x"));

    let mut plain = SoapResponse::new("<r/>", "text/xml", LOCATION, "", SoapVersion::Soap11);
    kernel.filter_response(&mut plain).unwrap();

    assert!(kernel.attachments().is_empty());
}
