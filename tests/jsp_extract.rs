use routemap::extractors::jsp::JspExtractor;
use routemap::extractors::EndpointExtractor;
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn jsp_pages_get_post_variants_and_params() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "WEB-INF/web.xml", "<web-app></web-app>");
    write(
        dir.path(),
        "search.jsp",
        "<html><% String q = request.getParameter(\"q\"); %></html>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    let search = endpoints
        .iter()
        .find(|e| e.url_path == "/search.jsp")
        .unwrap();
    assert_eq!(search.http_method, "GET");
    assert!(search.has_parameter("q"));
    assert_eq!(search.variants.len(), 1);
    assert_eq!(search.variants[0].http_method, "POST");
    assert!(search.variants[0].has_parameter("q"));
    assert_eq!(search.start_line, 1);
    assert_eq!(search.end_line, 2);
}

#[test]
fn include_chain_propagates_parameters() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "WEB-INF/web.xml", "<web-app></web-app>");
    write(
        dir.path(),
        "a.jsp",
        "<%@ include file=\"b.jsp\" %>\n<html/>\n",
    );
    write(
        dir.path(),
        "b.jsp",
        "<jsp:include page=\"c.jsp\" />\n",
    );
    write(
        dir.path(),
        "c.jsp",
        "<% String token = request.getParameter(\"token\"); %>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    let a = endpoints.iter().find(|e| e.url_path == "/a.jsp").unwrap();
    assert!(a.has_parameter("token"));
}

#[test]
fn mutual_include_terminates() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "x.jsp",
        "<%@ include file=\"y.jsp\" %>\n<% request.getParameter(\"left\"); %>\n",
    );
    write(
        dir.path(),
        "y.jsp",
        "<%@ include file=\"x.jsp\" %>\n<% request.getParameter(\"right\"); %>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    let x = endpoints.iter().find(|e| e.url_path == "/x.jsp").unwrap();
    assert!(x.has_parameter("left"));
    assert!(x.has_parameter("right"));
}

#[test]
fn descriptor_servlet_mapping_and_welcome_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "webapp/WEB-INF/web.xml",
        r#"<web-app>
  <servlet>
    <servlet-name>report</servlet-name>
    <jsp-file>/report.jsp</jsp-file>
  </servlet>
  <servlet-mapping>
    <servlet-name>report</servlet-name>
    <url-pattern>/reports/current</url-pattern>
  </servlet-mapping>
  <welcome-file-list>
    <welcome-file>index.jsp</welcome-file>
  </welcome-file-list>
</web-app>"#,
    );
    write(dir.path(), "webapp/index.jsp", "<html/>\n");
    write(
        dir.path(),
        "webapp/report.jsp",
        "<% request.getParameter(\"month\"); %>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    assert!(endpoints.iter().any(|e| e.url_path == "/index.jsp"));
    let mapped = endpoints
        .iter()
        .find(|e| e.url_path == "/reports/current")
        .unwrap();
    assert_eq!(mapped.file_path, "webapp/report.jsp");
    assert!(mapped.has_parameter("month"));
    assert!(endpoints.iter().any(|e| e.url_path == "/"));
}

#[test]
fn markup_hyperlinks_attach_parameters() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "index.jsp",
        "<a href=\"detail.jsp?id=7\">detail</a>\n",
    );
    write(dir.path(), "detail.jsp", "<html/>\n");

    let endpoints = JspExtractor.extract(dir.path());
    let detail = endpoints
        .iter()
        .find(|e| e.url_path == "/detail.jsp")
        .unwrap();
    assert!(detail.has_parameter("id"));
}

#[test]
fn markup_references_pick_the_best_scoring_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "webapp/WEB-INF/web.xml",
        r#"<web-app>
  <servlet>
    <servlet-name>report</servlet-name>
    <jsp-file>/pages/report.jsp</jsp-file>
  </servlet>
  <servlet-mapping>
    <servlet-name>report</servlet-name>
    <url-pattern>/reports/*</url-pattern>
  </servlet-mapping>
</web-app>"#,
    );
    write(dir.path(), "webapp/pages/report.jsp", "<html/>\n");
    write(
        dir.path(),
        "webapp/index.jsp",
        "<a href=\"reports/monthly?month=3\">monthly</a>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    // the wildcard mapping covers the link even though the paths differ
    let mapped = endpoints
        .iter()
        .find(|e| e.url_path == "/reports/*")
        .unwrap();
    assert!(mapped.has_parameter("month"));
}

#[test]
fn file_inputs_supersede_query_string_detections() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "upload.jsp",
        "<% request.getParameter(\"doc\"); %>\n",
    );
    write(
        dir.path(),
        "index.jsp",
        "<form action=\"upload.jsp\"><input type=\"file\" name=\"doc\" /></form>\n",
    );

    let endpoints = JspExtractor.extract(dir.path());
    let upload = endpoints
        .iter()
        .find(|e| e.url_path == "/upload.jsp")
        .unwrap();
    assert_eq!(
        upload.parameters["doc"].param_type,
        routemap::model::ParamType::Files
    );
}

#[test]
fn class_backed_servlet_mappings_become_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "webapp/WEB-INF/web.xml",
        r#"<web-app>
  <servlet>
    <servlet-name>login</servlet-name>
    <servlet-class>com.acme.LoginServlet</servlet-class>
  </servlet>
  <servlet-mapping>
    <servlet-name>login</servlet-name>
    <url-pattern>/login.do</url-pattern>
  </servlet-mapping>
</web-app>"#,
    );
    write(
        dir.path(),
        "src/com/acme/LoginServlet.java",
        r#"package com.acme;

public class LoginServlet extends HttpServlet {
    protected void doPost(HttpServletRequest request, HttpServletResponse response) {
        String user = request.getParameter("username");
    }
}
"#,
    );

    let endpoints = JspExtractor.extract(dir.path());
    let login = endpoints
        .iter()
        .find(|e| e.url_path == "/login.do")
        .unwrap();
    assert_eq!(login.file_path, "src/com/acme/LoginServlet.java");
    assert!(login.has_parameter("username"));
    assert_eq!(login.variants[0].http_method, "POST");
}
