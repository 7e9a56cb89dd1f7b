use routemap::extractors::rails::RailsExtractor;
use routemap::extractors::EndpointExtractor;
use routemap::model::ParamDataType;
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn routes_pair_with_controllers_and_schema_types() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "config/routes.rb",
        "resources :users, only: [:show]\nget 'users/search' => 'users#search'\n",
    );
    write(
        dir.path(),
        "app/controllers/users_controller.rb",
        r#"class UsersController < ApplicationController
  def show
    @user = User.new
    @age = params[:age]
  end

  def search
    @q = params[:q]
  end
end
"#,
    );
    write(
        dir.path(),
        "db/schema.rb",
        "create_table \"users\" do |t|\n  t.integer \"age\"\n  t.string \"name\"\nend\n",
    );

    let endpoints = RailsExtractor.extract(dir.path());
    let show = endpoints.iter().find(|e| e.url_path == "users/:id").unwrap();
    assert_eq!(show.file_path, "app/controllers/users_controller.rb");
    assert!(show.start_line > 0);
    let age = &show.parameters["age"];
    assert_eq!(age.data_type, ParamDataType::Integer);

    let search = endpoints
        .iter()
        .find(|e| e.url_path == "users/search")
        .unwrap();
    assert!(search.has_parameter("q"));
}

#[test]
fn namespaced_routes_find_module_controllers() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "config/routes.rb",
        "namespace :admin do\n  get 'reports' => 'reports#index'\nend\n",
    );
    write(
        dir.path(),
        "app/controllers/admin/reports_controller.rb",
        "class Admin::ReportsController < ApplicationController\n  def index\n    params[:month]\n  end\nend\n",
    );

    let endpoints = RailsExtractor.extract(dir.path());
    let report = endpoints
        .iter()
        .find(|e| e.url_path == "admin/reports")
        .unwrap();
    assert_eq!(
        report.file_path,
        "app/controllers/admin/reports_controller.rb"
    );
    assert!(report.has_parameter("month"));
}

#[test]
fn missing_routes_file_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(RailsExtractor.extract(dir.path()).is_empty());
}
