//! Framework detection heuristics, applied in a fixed order so a tree
//! holding traces of several frameworks resolves deterministically.

use crate::extractors::walk_files;
use crate::model::FrameworkType;
use std::path::Path;
use tracing::info;

pub fn detect(root: &Path) -> FrameworkType {
    let detected = run_heuristics(root);
    info!(framework = detected.as_str(), "framework detected");
    detected
}

fn run_heuristics(root: &Path) -> FrameworkType {
    if root.join("config").join("routes.rb").is_file() {
        return FrameworkType::Rails;
    }

    let mut has_aspx = false;
    let mut has_cshtml = false;
    let mut has_route_config = false;
    let mut has_struts_xml = false;
    let mut has_web_xml = false;
    let mut has_jsp = false;
    let mut has_urls_py = false;
    let mut java_files = Vec::new();
    let mut controller_cs = Vec::new();

    for file in walk_files(root, None) {
        let rel = file.rel_path.as_str();
        if rel.ends_with("urls.py") {
            has_urls_py = true;
        } else if rel.ends_with("struts.xml") {
            has_struts_xml = true;
        } else if rel.ends_with("web.xml") {
            has_web_xml = true;
        } else if rel.ends_with(".jsp") {
            has_jsp = true;
        } else if rel.ends_with(".aspx") {
            has_aspx = true;
        } else if rel.ends_with(".cshtml") {
            has_cshtml = true;
        } else if rel.ends_with("RouteConfig.cs") || rel.ends_with("Startup.cs") {
            has_route_config = true;
        } else if rel.ends_with("Controller.cs") {
            controller_cs.push(file);
        } else if rel.ends_with(".java") {
            java_files.push(file);
        }
    }

    if has_urls_py {
        return FrameworkType::Django;
    }
    if has_struts_xml {
        return FrameworkType::Struts;
    }
    if has_route_config || has_cshtml || has_attribute_routes(&controller_cs) {
        return FrameworkType::DotNetMvc;
    }
    if has_aspx {
        return FrameworkType::DotNetWebForms;
    }
    if has_spring_controller(&java_files) {
        return FrameworkType::SpringMvc;
    }
    if has_web_xml || has_jsp {
        return FrameworkType::Jsp;
    }
    FrameworkType::None
}

fn has_spring_controller(files: &[crate::extractors::SourceFile]) -> bool {
    files.iter().any(|file| {
        crate::util::read_to_string(&file.abs_path)
            .map(|source| {
                source.contains("@Controller") || source.contains("@RestController")
            })
            .unwrap_or(false)
    })
}

fn has_attribute_routes(files: &[crate::extractors::SourceFile]) -> bool {
    files.iter().any(|file| {
        crate::util::read_to_string(&file.abs_path)
            .map(|source| source.contains("[Route(") || source.contains("[HttpGet"))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn rails_wins_over_jsp_traces() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "config/routes.rb", "resources :users\n");
        touch(dir.path(), "public/index.jsp", "<html/>");
        assert_eq!(run_heuristics(dir.path()), FrameworkType::Rails);
    }

    #[test]
    fn django_detected_from_urls_py() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "app/urls.py", "urlpatterns = []\n");
        assert_eq!(run_heuristics(dir.path()), FrameworkType::Django);
    }

    #[test]
    fn spring_detected_from_controller_annotation() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            "src/UserController.java",
            "@RestController\npublic class UserController {}\n",
        );
        assert_eq!(run_heuristics(dir.path()), FrameworkType::SpringMvc);
    }

    #[test]
    fn plain_jsp_tree_falls_through_to_jsp() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.jsp", "<html/>");
        assert_eq!(run_heuristics(dir.path()), FrameworkType::Jsp);
    }

    #[test]
    fn empty_tree_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_heuristics(dir.path()), FrameworkType::None);
    }
}
